//! Core library for the Lyric Sync application.
//!
//! Lines of text are aligned to timestamps in a recording. The crate owns the
//! three parts that need real design work: the [`Timeline`] model and its
//! ordering invariants, the threaded [`PlaybackEngine`], and the
//! [`WaveformAnalyzer`] feature extraction. Project persistence, subtitle
//! export and the transcription hand-off sit next to them as thin
//! collaborators.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod export;
pub mod playback;
pub mod project;
pub mod timeline;
pub mod transcript;

pub use analysis::{SilenceInterval, WaveformAnalyzer, WaveformFeatures, WaveformStats};
pub use audio::AudioBuffer;
pub use config::{AnalysisConfig, AppConfig, AudioConfig, ProjectConfig};
pub use error::{Result, SyncError};
pub use export::{export, export_all, ExportFormat};
pub use playback::{
    AudioInfo, AudioOutput, FinishReason, NoopObserver, PacedOutput, PlaybackEngine,
    PlaybackEvent, PlaybackObserver, PlaybackSession, PlaybackState,
};
#[cfg(feature = "device")]
pub use playback::CpalOutput;
pub use project::{Project, ProjectFile, ProjectInfo, ProjectStore};
pub use timeline::{TimedLine, Timeline, Violation};
pub use transcript::{TranscriptSegment, Transcriber};
