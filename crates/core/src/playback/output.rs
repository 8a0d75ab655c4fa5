use std::{
    sync::{Condvar, Mutex},
    time::{Duration, Instant},
};

use crate::{Result, SyncError};

/// Sink the playback loop renders into.
///
/// `write` blocks the calling (playback) thread until the chunk has been
/// rendered at `sample_rate`. `abort` is called from the controlling thread and
/// must make a blocked `write` return promptly so the playback thread can be
/// joined without a timeout. An abort stays in effect until `reset`, so a
/// `write` that starts after it returns at once; the engine resets the output
/// before every new session.
pub trait AudioOutput: Send + Sync {
    fn write(&self, samples: &[f32], channels: u16, sample_rate: u32) -> Result<()>;

    fn abort(&self) {}

    fn reset(&self) {}
}

/// Device-less output that only waits for as long as the chunk would take to
/// play. Used for headless runs and tests.
#[derive(Debug, Default)]
pub struct PacedOutput {
    aborted: Mutex<bool>,
    wake: Condvar,
}

impl PacedOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioOutput for PacedOutput {
    fn write(&self, samples: &[f32], channels: u16, sample_rate: u32) -> Result<()> {
        if channels == 0 || sample_rate == 0 {
            return Err(SyncError::InvalidInput("output needs channels and a sample rate"));
        }

        let frames = samples.len() / channels as usize;
        let deadline = Instant::now() + Duration::from_secs_f64(frames as f64 / sample_rate as f64);

        let mut aborted = self
            .aborted
            .lock()
            .map_err(|_| SyncError::PoisonedLock("paced output"))?;
        while !*aborted {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            aborted = self
                .wake
                .wait_timeout(aborted, deadline - now)
                .map_err(|_| SyncError::PoisonedLock("paced output"))?
                .0;
        }

        Ok(())
    }

    fn abort(&self) {
        if let Ok(mut aborted) = self.aborted.lock() {
            *aborted = true;
        }
        self.wake.notify_all();
    }

    fn reset(&self) {
        if let Ok(mut aborted) = self.aborted.lock() {
            *aborted = false;
        }
    }
}

#[cfg(feature = "device")]
pub use device::CpalOutput;

#[cfg(feature = "device")]
mod device {
    use std::{
        collections::VecDeque,
        sync::{mpsc, Arc, Condvar, Mutex, MutexGuard},
        thread::{self, JoinHandle},
    };

    use cpal::{
        traits::{DeviceTrait, HostTrait, StreamTrait},
        FromSample, Sample, SizedSample,
    };

    use super::AudioOutput;
    use crate::{Result, SyncError};

    #[derive(Default)]
    struct Queue {
        samples: VecDeque<f32>,
        source_channels: usize,
        /// Source frames consumed per device frame.
        step: f64,
        cursor: f64,
        aborted: bool,
        failure: Option<String>,
    }

    impl Queue {
        fn queued_frames(&self) -> usize {
            if self.source_channels == 0 {
                0
            } else {
                self.samples.len() / self.source_channels
            }
        }

        fn fill<T>(&mut self, data: &mut [T], device_channels: usize)
        where
            T: Sample + FromSample<f32>,
        {
            for frame in data.chunks_mut(device_channels) {
                let index = self.cursor as usize;
                if index >= self.queued_frames() {
                    frame.iter_mut().for_each(|sample| *sample = T::EQUILIBRIUM);
                    continue;
                }
                let base = index * self.source_channels;
                for (channel, sample) in frame.iter_mut().enumerate() {
                    *sample = T::from_sample(self.samples[base + channel % self.source_channels]);
                }
                self.cursor += self.step;
            }

            let consumed = (self.cursor as usize).min(self.queued_frames());
            self.samples.drain(..consumed * self.source_channels);
            self.cursor -= consumed as f64;
            if self.samples.is_empty() {
                self.cursor = 0.0;
            }
        }
    }

    struct Shared {
        queue: Mutex<Queue>,
        drained: Condvar,
    }

    impl Shared {
        fn lock(&self) -> Result<MutexGuard<'_, Queue>> {
            self.queue
                .lock()
                .map_err(|_| SyncError::PoisonedLock("device queue"))
        }
    }

    /// Output through the default device of the default cpal host.
    ///
    /// `cpal::Stream` is not `Send`, so the stream lives on its own thread for
    /// the lifetime of this value. Chunks are resampled to the device rate by
    /// stepping through source frames, which is what shifts the pitch together
    /// with the playback speed, and converted to the device's sample format in
    /// the stream callback.
    pub struct CpalOutput {
        shared: Arc<Shared>,
        device_rate: u32,
        shutdown: Option<mpsc::Sender<()>>,
        thread: Option<JoinHandle<()>>,
    }

    impl CpalOutput {
        pub fn open() -> Result<Self> {
            let shared = Arc::new(Shared {
                queue: Mutex::new(Queue::default()),
                drained: Condvar::new(),
            });
            let (ready_tx, ready_rx) = mpsc::channel::<Result<u32>>();
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

            let stream_shared = shared.clone();
            let thread = thread::Builder::new()
                .name("audio-device".into())
                .spawn(move || {
                    let stream = match open_stream(stream_shared) {
                        Ok((stream, rate)) => {
                            let _ = ready_tx.send(Ok(rate));
                            stream
                        }
                        Err(err) => {
                            let _ = ready_tx.send(Err(err));
                            return;
                        }
                    };
                    // Hold the stream until the output is dropped.
                    let _ = shutdown_rx.recv();
                    drop(stream);
                })?;

            let device_rate = ready_rx
                .recv()
                .map_err(|_| SyncError::Device("device thread exited during start-up".into()))??;

            tracing::debug!(device_rate, "opened audio output device");
            Ok(Self {
                shared,
                device_rate,
                shutdown: Some(shutdown_tx),
                thread: Some(thread),
            })
        }

        pub fn device_rate(&self) -> u32 {
            self.device_rate
        }
    }

    fn open_stream(shared: Arc<Shared>) -> Result<(cpal::Stream, u32)> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SyncError::Device("no default output device".into()))?;
        let supported = device
            .default_output_config()
            .map_err(|err| SyncError::Device(err.to_string()))?;

        let format = supported.sample_format();
        let config = supported.config();
        let device_rate = config.sample_rate.0;
        tracing::debug!(?format, channels = config.channels, "building output stream");

        let stream = match format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, shared),
            cpal::SampleFormat::F64 => build_stream::<f64>(&device, &config, shared),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, shared),
            cpal::SampleFormat::I32 => build_stream::<i32>(&device, &config, shared),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, shared),
            cpal::SampleFormat::U8 => build_stream::<u8>(&device, &config, shared),
            other => Err(SyncError::Device(format!("unsupported device sample format {other:?}"))),
        }?;
        stream
            .play()
            .map_err(|err| SyncError::Device(err.to_string()))?;

        Ok((stream, device_rate))
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        shared: Arc<Shared>,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let device_channels = config.channels as usize;
        let data_shared = shared.clone();
        let error_shared = shared;

        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut queue) = data_shared.queue.lock() else {
                        data.iter_mut().for_each(|sample| *sample = T::EQUILIBRIUM);
                        return;
                    };
                    queue.fill(data, device_channels);
                    if queue.samples.is_empty() {
                        data_shared.drained.notify_all();
                    }
                },
                move |err| {
                    tracing::error!(%err, "audio device stream failed");
                    if let Ok(mut queue) = error_shared.queue.lock() {
                        queue.failure = Some(err.to_string());
                    }
                    error_shared.drained.notify_all();
                },
                None,
            )
            .map_err(|err| SyncError::Device(err.to_string()))
    }

    impl AudioOutput for CpalOutput {
        fn write(&self, samples: &[f32], channels: u16, sample_rate: u32) -> Result<()> {
            if channels == 0 || sample_rate == 0 {
                return Err(SyncError::InvalidInput("output needs channels and a sample rate"));
            }

            let mut queue = self.shared.lock()?;
            if let Some(failure) = queue.failure.clone() {
                return Err(SyncError::Device(failure));
            }
            if queue.aborted {
                return Ok(());
            }
            queue.source_channels = channels as usize;
            queue.step = sample_rate as f64 / self.device_rate as f64;
            queue.samples.extend(samples.iter().copied());

            while !queue.samples.is_empty() && !queue.aborted {
                if let Some(failure) = queue.failure.clone() {
                    return Err(SyncError::Device(failure));
                }
                queue = self
                    .shared
                    .drained
                    .wait(queue)
                    .map_err(|_| SyncError::PoisonedLock("device queue"))?;
            }
            Ok(())
        }

        fn abort(&self) {
            if let Ok(mut queue) = self.shared.queue.lock() {
                queue.samples.clear();
                queue.cursor = 0.0;
                queue.aborted = true;
            }
            self.shared.drained.notify_all();
        }

        fn reset(&self) {
            if let Ok(mut queue) = self.shared.queue.lock() {
                queue.aborted = false;
            }
        }
    }

    impl Drop for CpalOutput {
        fn drop(&mut self) {
            self.abort();
            self.shutdown.take();
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn queue_with(samples: &[f32], channels: usize, step: f64) -> Queue {
            Queue {
                samples: samples.iter().copied().collect(),
                source_channels: channels,
                step,
                ..Default::default()
            }
        }

        #[test]
        fn fill_converts_to_integer_device_samples() {
            let mut queue = queue_with(&[0.5, -0.5, 0.0], 1, 1.0);
            let mut data = [7_i16; 4];
            queue.fill(&mut data, 1);

            assert_eq!(data[0], 16_384);
            assert_eq!(data[1], -16_384);
            assert_eq!(data[2], 0);
            assert_eq!(data[3], 0);
            assert!(queue.samples.is_empty());
        }

        #[test]
        fn fill_pads_unsigned_devices_with_equilibrium() {
            let mut queue = queue_with(&[], 1, 1.0);
            let mut data = [0_u16; 3];
            queue.fill(&mut data, 1);
            assert!(data.iter().all(|sample| *sample == u16::EQUILIBRIUM));
        }

        #[test]
        fn fill_steps_through_source_frames() {
            let mut queue = queue_with(&[0.1, 0.2, 0.3, 0.4], 2, 2.0);
            let mut data = [0.0_f32; 4];
            queue.fill(&mut data, 2);
            assert_eq!(data, [0.1, 0.2, 0.0, 0.0]);
            assert!(queue.samples.is_empty());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn paced_output_waits_for_the_chunk_duration() {
        let output = PacedOutput::new();
        let started = Instant::now();
        output.write(&[0.0; 200], 2, 1000).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn abort_releases_a_blocked_write() {
        let output = Arc::new(PacedOutput::new());
        let writer = output.clone();
        let started = Instant::now();
        let handle = thread::spawn(move || writer.write(&[0.0; 10_000], 1, 1000));

        while !handle.is_finished() {
            output.abort();
            thread::sleep(Duration::from_millis(10));
        }
        handle.join().unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn abort_before_write_is_not_lost() {
        let output = PacedOutput::new();
        output.abort();

        let started = Instant::now();
        output.write(&[0.0; 10_000], 1, 1000).unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));

        output.reset();
        let started = Instant::now();
        output.write(&[0.0; 100], 1, 1000).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn paced_output_rejects_zero_rate() {
        assert!(PacedOutput::new().write(&[0.0; 4], 2, 0).is_err());
    }
}
