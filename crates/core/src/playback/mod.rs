//! Transport control over a decoded buffer.
//!
//! A [`PlaybackEngine`] renders audio on one dedicated thread per session.
//! The controlling thread only flips the session state and a cancellation
//! flag; the playback thread polls both between chunks and is the only writer
//! of the position while it runs. Every session ends with exactly one
//! [`PlaybackObserver::on_playback_finished`] call, whatever the exit path.

mod output;

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc, Mutex, MutexGuard,
    },
    thread::{self, JoinHandle},
};

use serde::{Deserialize, Serialize};

use crate::{AudioBuffer, AudioConfig, Result, SyncError};

#[cfg(feature = "device")]
pub use output::CpalOutput;
pub use output::{AudioOutput, PacedOutput};

pub const MIN_SPEED: f32 = 0.25;
pub const MAX_SPEED: f32 = 4.0;
/// Largest accepted `chunk_frames`, about twenty seconds at 48 kHz.
pub const MAX_CHUNK_FRAMES: usize = 1 << 20;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Transport state shared between the controller and the playback thread.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSession {
    pub state: PlaybackState,
    /// Seconds from the start of the buffer.
    pub position: f64,
    pub volume: f32,
    pub speed: f32,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            state: PlaybackState::Stopped,
            position: 0.0,
            volume: 1.0,
            speed: 1.0,
        }
    }
}

/// Why a playback session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum FinishReason {
    /// The end of the buffer was rendered.
    Completed,
    /// `pause`, `stop`, `seek` or dropping the engine ended the session.
    Interrupted,
    /// The output rejected a chunk; the engine is now stopped.
    Failed(String),
}

/// Receives notifications from the playback thread. Calls for one session
/// arrive in order; marshaling them to a UI thread is up to the
/// implementation.
pub trait PlaybackObserver: Send + Sync {
    fn on_position_changed(&self, seconds: f64);

    fn on_playback_finished(&self, reason: FinishReason);
}

/// Observer for callers that do not care about notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PlaybackObserver for NoopObserver {
    fn on_position_changed(&self, _seconds: f64) {}

    fn on_playback_finished(&self, _reason: FinishReason) {}
}

/// Notification forwarded over a channel by the `Sender` observer.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Position(f64),
    Finished(FinishReason),
}

impl PlaybackObserver for mpsc::Sender<PlaybackEvent> {
    fn on_position_changed(&self, seconds: f64) {
        let _ = self.send(PlaybackEvent::Position(seconds));
    }

    fn on_playback_finished(&self, reason: FinishReason) {
        let _ = self.send(PlaybackEvent::Finished(reason));
    }
}

/// Summary of the loaded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    pub duration: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub frames: usize,
}

struct Worker {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Frame-accurate transport over an [`AudioBuffer`].
///
/// Transport calls never block on audio except when a session has to be torn
/// down: the engine then raises the cancellation flag, aborts the output so
/// the blocked chunk returns, and joins the playback thread. Dropping the
/// engine does the same, so no playback thread outlives it.
pub struct PlaybackEngine {
    config: AudioConfig,
    buffer: Option<Arc<AudioBuffer>>,
    session: Arc<Mutex<PlaybackSession>>,
    output: Arc<dyn AudioOutput>,
    observer: Arc<dyn PlaybackObserver>,
    worker: Option<Worker>,
}

impl PlaybackEngine {
    pub fn new(output: Arc<dyn AudioOutput>, observer: Arc<dyn PlaybackObserver>) -> Self {
        Self::with_config(AudioConfig::default(), output, observer)
    }

    pub fn with_config(
        config: AudioConfig,
        output: Arc<dyn AudioOutput>,
        observer: Arc<dyn PlaybackObserver>,
    ) -> Self {
        Self {
            config,
            buffer: None,
            session: Arc::new(Mutex::new(PlaybackSession::default())),
            output,
            observer,
            worker: None,
        }
    }

    /// Replaces the notification sink. Takes effect with the next session.
    pub fn subscribe(&mut self, observer: Arc<dyn PlaybackObserver>) {
        self.observer = observer;
    }

    /// Stops any running session and takes ownership of a new buffer,
    /// converted to the configured output channel layout.
    pub fn load(&mut self, buffer: &AudioBuffer) -> Result<()> {
        if self.config.chunk_frames == 0 || self.config.chunk_frames > MAX_CHUNK_FRAMES {
            return Err(SyncError::InvalidInput(
                "chunk size must be between one frame and MAX_CHUNK_FRAMES",
            ));
        }
        let converted = buffer.to_channels(self.config.output_channels)?;

        self.stop()?;
        tracing::debug!(
            frames = converted.frames(),
            sample_rate = converted.sample_rate(),
            channels = converted.channels(),
            "loaded playback buffer"
        );
        self.buffer = Some(Arc::new(converted));
        Ok(())
    }

    pub fn unload(&mut self) -> Result<()> {
        self.stop()?;
        self.buffer = None;
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn audio_info(&self) -> Option<AudioInfo> {
        self.buffer.as_ref().map(|buffer| AudioInfo {
            duration: buffer.duration(),
            sample_rate: buffer.sample_rate(),
            channels: buffer.channels(),
            frames: buffer.frames(),
        })
    }

    /// Length of the loaded buffer in seconds, zero when nothing is loaded.
    pub fn duration(&self) -> f64 {
        self.buffer.as_ref().map_or(0.0, |buffer| buffer.duration())
    }

    /// Snapshot of the transport state.
    pub fn session(&self) -> Result<PlaybackSession> {
        Ok(*self.lock_session()?)
    }

    pub fn state(&self) -> Result<PlaybackState> {
        Ok(self.lock_session()?.state)
    }

    pub fn position(&self) -> Result<f64> {
        Ok(self.lock_session()?.position)
    }

    /// True while a playback thread exists and has not returned yet.
    pub fn is_rendering(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Starts playback from the current position, or resumes after a pause.
    /// Does nothing without a buffer or while already playing. Playing again
    /// after the buffer ran out starts over from the beginning.
    pub fn play(&mut self) -> Result<()> {
        let Some(buffer) = self.buffer.clone() else {
            return Ok(());
        };

        {
            let mut session = self.lock_session()?;
            match session.state {
                PlaybackState::Playing => return Ok(()),
                PlaybackState::Paused => {}
                PlaybackState::Stopped => {
                    if session.position >= buffer.duration() {
                        session.position = 0.0;
                    }
                }
            }
            session.state = PlaybackState::Playing;
            tracing::debug!(position = session.position, "playback started");
        }

        // A finished or paused session may still hold a handle.
        self.join_worker();
        self.spawn_worker(buffer)
    }

    /// Pauses while playing; the position is kept.
    pub fn pause(&mut self) -> Result<()> {
        {
            let mut session = self.lock_session()?;
            if session.state != PlaybackState::Playing {
                return Ok(());
            }
            session.state = PlaybackState::Paused;
            self.raise_cancel();
            tracing::debug!(position = session.position, "playback paused");
        }

        self.join_worker();
        Ok(())
    }

    /// Stops and rewinds to the start. Returns once the playback thread has
    /// exited.
    pub fn stop(&mut self) -> Result<()> {
        {
            let mut session = self.lock_session()?;
            session.state = PlaybackState::Stopped;
            session.position = 0.0;
            self.raise_cancel();
        }

        self.join_worker();
        tracing::debug!("playback stopped");
        Ok(())
    }

    /// Moves to `seconds`, clamped to the buffer. While playing, the current
    /// session is torn down and a new one starts at the new position.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        let Some(buffer) = self.buffer.clone() else {
            return Ok(());
        };
        let target = if seconds.is_nan() {
            0.0
        } else {
            seconds.clamp(0.0, buffer.duration())
        };

        let restart = {
            let mut session = self.lock_session()?;
            session.position = target;
            let playing = session.state == PlaybackState::Playing;
            if playing {
                self.raise_cancel();
            }
            playing
        };

        tracing::debug!(position = target, restart, "seek");
        if restart {
            self.join_worker();
            self.spawn_worker(buffer)?;
        }
        Ok(())
    }

    /// Sets the gain applied to each chunk, clamped to `[0, 1]`.
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        if volume.is_nan() {
            return Ok(());
        }
        self.lock_session()?.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    /// Sets the rate multiplier, clamped to `[MIN_SPEED, MAX_SPEED]`. The
    /// output rate is scaled directly, so pitch follows speed.
    pub fn set_speed(&self, speed: f32) -> Result<()> {
        if speed.is_nan() {
            return Ok(());
        }
        self.lock_session()?.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        Ok(())
    }

    fn spawn_worker(&mut self, buffer: Arc<AudioBuffer>) -> Result<()> {
        // Any previous session has been joined, so its abort can be lifted.
        self.output.reset();
        let cancel = Arc::new(AtomicBool::new(false));
        let playback = PlaybackLoop {
            buffer,
            session: self.session.clone(),
            cancel: cancel.clone(),
            output: self.output.clone(),
            observer: self.observer.clone(),
            chunk_frames: self.config.chunk_frames,
        };

        let spawned = thread::Builder::new()
            .name("playback".into())
            .spawn(move || playback.run());

        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker { cancel, handle });
                Ok(())
            }
            Err(err) => {
                self.lock_session()?.state = PlaybackState::Stopped;
                Err(err.into())
            }
        }
    }

    /// Must be called with the session lock held so the playback thread
    /// observes the flag and the new state together.
    fn raise_cancel(&self) {
        if let Some(worker) = &self.worker {
            worker.cancel.store(true, Ordering::SeqCst);
        }
    }

    fn join_worker(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        worker.cancel.store(true, Ordering::SeqCst);
        self.output.abort();
        if worker.handle.join().is_err() {
            tracing::error!("playback thread panicked");
        }
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, PlaybackSession>> {
        self.session
            .lock()
            .map_err(|_| SyncError::PoisonedLock("playback session"))
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        if let Ok(mut session) = self.session.lock() {
            session.state = PlaybackState::Stopped;
        }
        self.join_worker();
    }
}

impl fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("config", &self.config)
            .field("buffer", &self.buffer)
            .field("session", &self.session.lock().ok().map(|session| *session))
            .field("rendering", &self.is_rendering())
            .finish()
    }
}

/// Everything one playback thread needs, moved onto that thread.
struct PlaybackLoop {
    buffer: Arc<AudioBuffer>,
    session: Arc<Mutex<PlaybackSession>>,
    cancel: Arc<AtomicBool>,
    output: Arc<dyn AudioOutput>,
    observer: Arc<dyn PlaybackObserver>,
    chunk_frames: usize,
}

impl PlaybackLoop {
    fn run(self) {
        let reason = match self.render() {
            Ok(reason) => reason,
            Err(err) => {
                tracing::error!(%err, "playback loop failed");
                if let Ok(mut session) = self.session.lock() {
                    if !self.cancelled() {
                        session.state = PlaybackState::Stopped;
                    }
                }
                FinishReason::Failed(err.to_string())
            }
        };

        tracing::debug!(?reason, "playback session ended");
        self.observer.on_playback_finished(reason);
    }

    fn render(&self) -> Result<FinishReason> {
        let sample_rate = self.buffer.sample_rate();
        let channels = self.buffer.channels();
        let total_frames = self.buffer.frames();

        let mut frame = {
            let session = self.lock()?;
            ((session.position * sample_rate as f64).round() as usize).min(total_frames)
        };
        let mut chunk = Vec::with_capacity(self.chunk_frames * channels as usize);

        loop {
            let (volume, speed) = {
                let mut session = self.lock()?;
                if self.cancelled() || session.state != PlaybackState::Playing {
                    return Ok(FinishReason::Interrupted);
                }
                if frame >= total_frames {
                    session.state = PlaybackState::Stopped;
                    return Ok(FinishReason::Completed);
                }
                (session.volume, session.speed)
            };

            let end = (frame + self.chunk_frames).min(total_frames);
            chunk.clear();
            chunk.extend(
                self.buffer
                    .frame_slice(frame, end)
                    .iter()
                    .map(|sample| sample * volume),
            );

            let effective_rate = ((sample_rate as f32 * speed).round() as u32).max(1);
            self.output.write(&chunk, channels, effective_rate)?;

            // Position is in buffer time; speed already changed the output rate.
            frame = end;
            let position = frame as f64 / sample_rate as f64;
            let finished = {
                let mut session = self.lock()?;
                if self.cancelled() || session.state != PlaybackState::Playing {
                    return Ok(FinishReason::Interrupted);
                }
                session.position = position;
                let finished = frame >= total_frames;
                if finished {
                    session.state = PlaybackState::Stopped;
                }
                finished
            };

            self.observer.on_position_changed(position);
            if finished {
                return Ok(FinishReason::Completed);
            }
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn lock(&self) -> Result<MutexGuard<'_, PlaybackSession>> {
        self.session
            .lock()
            .map_err(|_| SyncError::PoisonedLock("playback session"))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::mpsc::{Receiver, RecvTimeoutError},
        time::Duration,
    };

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    /// Output that returns immediately and keeps everything it was given.
    #[derive(Default)]
    struct RecordingOutput {
        writes: Mutex<Vec<(Vec<f32>, u16, u32)>>,
        fail_after: Option<usize>,
    }

    impl AudioOutput for RecordingOutput {
        fn write(&self, samples: &[f32], channels: u16, sample_rate: u32) -> Result<()> {
            let mut writes = self.writes.lock().unwrap();
            if self.fail_after.is_some_and(|limit| writes.len() >= limit) {
                return Err(SyncError::Device("device unplugged".into()));
            }
            writes.push((samples.to_vec(), channels, sample_rate));
            Ok(())
        }
    }

    fn constant_buffer(seconds: usize, sample_rate: u32, value: f32) -> AudioBuffer {
        AudioBuffer::mono(vec![value; seconds * sample_rate as usize], sample_rate).unwrap()
    }

    fn build_engine(
        output: Arc<dyn AudioOutput>,
        chunk_frames: usize,
    ) -> (PlaybackEngine, Receiver<PlaybackEvent>) {
        let (tx, rx) = mpsc::channel::<PlaybackEvent>();
        let config = AudioConfig {
            chunk_frames,
            ..Default::default()
        };
        (PlaybackEngine::with_config(config, output, Arc::new(tx)), rx)
    }

    fn wait_for_finish(rx: &Receiver<PlaybackEvent>) -> (Vec<f64>, FinishReason) {
        let mut positions = Vec::new();
        loop {
            match rx.recv_timeout(WAIT).expect("playback should finish") {
                PlaybackEvent::Position(seconds) => positions.push(seconds),
                PlaybackEvent::Finished(reason) => return (positions, reason),
            }
        }
    }

    fn wait_for_position_after(rx: &Receiver<PlaybackEvent>, threshold: f64) -> f64 {
        loop {
            if let PlaybackEvent::Position(seconds) = rx.recv_timeout(WAIT).unwrap() {
                if seconds > threshold {
                    return seconds;
                }
            }
        }
    }

    #[test]
    fn play_without_buffer_does_nothing() {
        let (mut engine, _rx) = build_engine(Arc::new(PacedOutput::new()), 64);
        engine.play().unwrap();
        assert_eq!(engine.state().unwrap(), PlaybackState::Stopped);
        assert!(!engine.is_rendering());
    }

    #[test]
    fn immediate_stop_leaves_no_thread() {
        let (mut engine, _rx) = build_engine(Arc::new(PacedOutput::new()), 1024);
        engine.load(&constant_buffer(5, 44_100, 0.1)).unwrap();

        engine.play().unwrap();
        engine.stop().unwrap();

        let session = engine.session().unwrap();
        assert_eq!(session.state, PlaybackState::Stopped);
        assert_eq!(session.position, 0.0);
        assert!(!engine.is_rendering());
        assert!(engine.worker.is_none());
    }

    #[test]
    fn runs_to_completion_once() {
        let output = Arc::new(RecordingOutput::default());
        let (mut engine, rx) = build_engine(output.clone(), 256);
        engine.load(&constant_buffer(1, 1000, 1.0)).unwrap();
        engine.set_volume(0.5).unwrap();
        engine.set_speed(2.0).unwrap();

        engine.play().unwrap();
        let (positions, reason) = wait_for_finish(&rx);

        assert_eq!(reason, FinishReason::Completed);
        assert_eq!(positions, vec![0.256, 0.512, 0.768, 1.0]);
        assert_eq!(engine.state().unwrap(), PlaybackState::Stopped);
        assert_eq!(engine.position().unwrap(), 1.0);

        let writes = output.writes.lock().unwrap();
        assert_eq!(writes.len(), 4);
        assert_eq!(writes[0].0.len(), 512);
        assert_eq!(writes[3].0.len(), 464);
        assert!(writes.iter().all(|(_, channels, rate)| *channels == 2 && *rate == 2000));
        assert!(writes.iter().flat_map(|(s, _, _)| s).all(|s| *s == 0.5));
        drop(writes);

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn replay_after_completion_starts_over() {
        let output = Arc::new(RecordingOutput::default());
        let (mut engine, rx) = build_engine(output, 500);
        engine.load(&constant_buffer(1, 1000, 0.2)).unwrap();

        engine.play().unwrap();
        wait_for_finish(&rx);
        engine.play().unwrap();
        let (positions, reason) = wait_for_finish(&rx);

        assert_eq!(reason, FinishReason::Completed);
        assert_eq!(positions, vec![0.5, 1.0]);
    }

    #[test]
    fn device_failure_stops_and_notifies() {
        let output = Arc::new(RecordingOutput {
            fail_after: Some(2),
            ..Default::default()
        });
        let (mut engine, rx) = build_engine(output, 100);
        engine.load(&constant_buffer(1, 1000, 0.2)).unwrap();

        engine.play().unwrap();
        let (positions, reason) = wait_for_finish(&rx);

        assert_eq!(positions, vec![0.1, 0.2]);
        assert!(matches!(reason, FinishReason::Failed(message) if message.contains("unplugged")));
        assert_eq!(engine.state().unwrap(), PlaybackState::Stopped);
    }

    #[test]
    fn pause_keeps_position_and_resume_continues() {
        let (mut engine, rx) = build_engine(Arc::new(PacedOutput::new()), 50);
        engine.load(&constant_buffer(10, 1000, 0.2)).unwrap();

        engine.play().unwrap();
        wait_for_position_after(&rx, 0.0);
        engine.pause().unwrap();

        let paused = engine.session().unwrap();
        assert_eq!(paused.state, PlaybackState::Paused);
        assert!(paused.position > 0.0 && paused.position < 10.0);
        assert!(!engine.is_rendering());
        assert_eq!(wait_for_finish(&rx).1, FinishReason::Interrupted);

        engine.play().unwrap();
        let resumed = wait_for_position_after(&rx, 0.0);
        assert!((resumed - (paused.position + 0.05)).abs() < 1e-9);

        engine.stop().unwrap();
        assert_eq!(engine.position().unwrap(), 0.0);
    }

    #[test]
    fn pause_outside_playing_is_ignored() {
        let (mut engine, _rx) = build_engine(Arc::new(PacedOutput::new()), 50);
        engine.load(&constant_buffer(1, 1000, 0.2)).unwrap();
        engine.pause().unwrap();
        assert_eq!(engine.state().unwrap(), PlaybackState::Stopped);
    }

    #[test]
    fn seek_clamps_to_the_buffer() {
        let (mut engine, _rx) = build_engine(Arc::new(PacedOutput::new()), 50);
        engine.seek(3.0).unwrap();
        assert_eq!(engine.position().unwrap(), 0.0);

        engine.load(&constant_buffer(5, 1000, 0.2)).unwrap();
        engine.seek(-5.0).unwrap();
        assert_eq!(engine.position().unwrap(), 0.0);
        engine.seek(10.0).unwrap();
        assert_eq!(engine.position().unwrap(), 5.0);
        engine.seek(2.5).unwrap();
        assert_eq!(engine.session().unwrap().state, PlaybackState::Stopped);
        assert_eq!(engine.position().unwrap(), 2.5);
    }

    #[test]
    fn seek_while_playing_restarts_at_target() {
        let (mut engine, rx) = build_engine(Arc::new(PacedOutput::new()), 50);
        engine.load(&constant_buffer(10, 1000, 0.2)).unwrap();

        engine.play().unwrap();
        wait_for_position_after(&rx, 0.0);
        engine.seek(6.0).unwrap();

        assert_eq!(wait_for_finish(&rx).1, FinishReason::Interrupted);
        let position = wait_for_position_after(&rx, 0.0);
        assert!((position - 6.05).abs() < 1e-9);
        assert_eq!(engine.state().unwrap(), PlaybackState::Playing);
        engine.stop().unwrap();
    }

    #[test]
    fn seek_while_paused_stays_paused() {
        let (mut engine, rx) = build_engine(Arc::new(PacedOutput::new()), 50);
        engine.load(&constant_buffer(10, 1000, 0.2)).unwrap();

        engine.play().unwrap();
        wait_for_position_after(&rx, 0.0);
        engine.pause().unwrap();
        assert_eq!(wait_for_finish(&rx).1, FinishReason::Interrupted);

        engine.seek(7.0).unwrap();
        let session = engine.session().unwrap();
        assert_eq!(session.state, PlaybackState::Paused);
        assert_eq!(session.position, 7.0);
        assert!(!engine.is_rendering());
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        // The abort issued by pause must not leak into the new session.
        let resumed = std::time::Instant::now();
        engine.play().unwrap();
        let position = wait_for_position_after(&rx, 0.0);
        assert!((position - 7.05).abs() < 1e-9);
        wait_for_position_after(&rx, 7.2);
        assert!(resumed.elapsed() >= Duration::from_millis(150));
        engine.stop().unwrap();
    }

    #[test]
    fn stop_while_paused_rewinds() {
        let (mut engine, rx) = build_engine(Arc::new(PacedOutput::new()), 50);
        engine.load(&constant_buffer(10, 1000, 0.2)).unwrap();

        engine.play().unwrap();
        wait_for_position_after(&rx, 0.0);
        engine.pause().unwrap();
        assert_eq!(wait_for_finish(&rx).1, FinishReason::Interrupted);

        engine.stop().unwrap();
        let session = engine.session().unwrap();
        assert_eq!(session.state, PlaybackState::Stopped);
        assert_eq!(session.position, 0.0);
        assert!(!engine.is_rendering());
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[test]
    fn load_rejects_out_of_range_chunk_sizes() {
        for chunk_frames in [0, MAX_CHUNK_FRAMES + 1, usize::MAX] {
            let (mut engine, _rx) = build_engine(Arc::new(PacedOutput::new()), chunk_frames);
            let err = engine.load(&constant_buffer(1, 1000, 0.2)).unwrap_err();
            assert!(matches!(err, SyncError::InvalidInput(_)));
            assert!(!engine.is_loaded());
        }

        let (mut engine, _rx) = build_engine(Arc::new(PacedOutput::new()), MAX_CHUNK_FRAMES);
        engine.load(&constant_buffer(1, 1000, 0.2)).unwrap();
        assert!(engine.is_loaded());
    }

    #[test]
    fn volume_and_speed_are_clamped() {
        let (engine, _rx) = build_engine(Arc::new(PacedOutput::new()), 50);
        for (input, expected) in [(-1.0, 0.0), (0.3, 0.3), (7.0, 1.0), (f32::INFINITY, 1.0)] {
            engine.set_volume(input).unwrap();
            assert_eq!(engine.session().unwrap().volume, expected);
        }
        for (input, expected) in [(0.0, 0.25), (1.5, 1.5), (10.0, 4.0), (f32::NEG_INFINITY, 0.25)] {
            engine.set_speed(input).unwrap();
            assert_eq!(engine.session().unwrap().speed, expected);
        }
    }

    #[test]
    fn load_normalizes_channel_layout() {
        let (mut engine, _rx) = build_engine(Arc::new(PacedOutput::new()), 50);
        engine.load(&constant_buffer(2, 8000, 0.0)).unwrap();

        let info = engine.audio_info().unwrap();
        assert_eq!(info.channels, 2);
        assert_eq!(info.frames, 16_000);
        assert_eq!(engine.duration(), 2.0);
    }

    #[test]
    fn dropping_the_engine_ends_the_session() {
        let (mut engine, rx) = build_engine(Arc::new(PacedOutput::new()), 50);
        engine.load(&constant_buffer(10, 1000, 0.2)).unwrap();
        engine.play().unwrap();
        wait_for_position_after(&rx, 0.0);

        drop(engine);

        assert_eq!(wait_for_finish(&rx).1, FinishReason::Interrupted);
        loop {
            match rx.recv_timeout(WAIT) {
                Ok(_) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => panic!("playback thread still holds the observer"),
            }
        }
    }
}
