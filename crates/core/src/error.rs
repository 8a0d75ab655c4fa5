/// Result alias that carries the custom [`SyncError`] type.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Free-form failure surfaced to the caller as a readable message.
    #[error("{0}")]
    Message(String),
    /// A caller supplied a value the operation cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Project or export JSON could not be (de)serialized.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// The FFT backend rejected a buffer.
    #[error("fft: {0}")]
    Fft(String),
    /// The audio output device failed to open or to accept a chunk.
    #[error("audio device: {0}")]
    Device(String),
    /// The export collaborator could not produce any output.
    #[error("export: {0}")]
    Export(String),
    /// A mutex shared with the playback thread was poisoned by a panic.
    #[error("{0} has been poisoned")]
    PoisonedLock(&'static str),
}

impl SyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for SyncError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SyncError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<realfft::FftError> for SyncError {
    fn from(value: realfft::FftError) -> Self {
        Self::Fft(value.to_string())
    }
}
