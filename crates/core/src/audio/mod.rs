use std::fmt;

use crate::{Result, SyncError};

/// Immutable block of decoded PCM audio.
///
/// Samples are stored interleaved as `f32` in `[-1, 1]`. The buffer is handed
/// over once by the decoder and never mutated afterwards, so both the playback
/// engine and the waveform analyzer can share it behind an `Arc`.
#[derive(Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Wraps interleaved samples. Fails when the layout cannot describe whole
    /// frames.
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Result<Self> {
        if channels == 0 {
            return Err(SyncError::InvalidInput("audio buffer needs at least one channel"));
        }
        if sample_rate == 0 {
            return Err(SyncError::InvalidInput("audio buffer needs a non-zero sample rate"));
        }
        if samples.len() % channels as usize != 0 {
            return Err(SyncError::InvalidInput(
                "sample count is not a multiple of the channel count",
            ));
        }

        Ok(Self {
            samples,
            channels,
            sample_rate,
        })
    }

    /// Convenience constructor for single channel material.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        Self::new(samples, 1, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length of the buffer in seconds.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Interleaved samples for the frame range `[start, end)`, clamped to the
    /// buffer.
    pub fn frame_slice(&self, start: usize, end: usize) -> &[f32] {
        let frames = self.frames();
        let start = start.min(frames);
        let end = end.clamp(start, frames);
        let channels = self.channels as usize;
        &self.samples[start * channels..end * channels]
    }

    /// Averages all channels into a single amplitude trace.
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels == 1 {
            return self.samples.clone();
        }

        let channels = self.channels as usize;
        self.samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }

    /// Returns a copy with the requested channel layout. Mono input is
    /// duplicated to every output channel, wider input is cycled or truncated.
    pub fn to_channels(&self, channels: u16) -> Result<Self> {
        if channels == 0 {
            return Err(SyncError::InvalidInput("audio buffer needs at least one channel"));
        }
        if channels == self.channels {
            return Ok(self.clone());
        }

        let source = self.channels as usize;
        let target = channels as usize;
        let mut samples = Vec::with_capacity(self.frames() * target);
        for frame in self.samples.chunks_exact(source) {
            for channel in 0..target {
                samples.push(frame[channel % source]);
            }
        }

        Self::new(samples, channels, self.sample_rate)
    }

    /// Mono samples between two timestamps, or `None` if the clamped range is
    /// empty.
    pub fn segment(&self, start: f64, end: f64) -> Option<Vec<f32>> {
        let rate = self.sample_rate as f64;
        let first = (start * rate).max(0.0) as usize;
        let last = ((end * rate).max(0.0) as usize).min(self.frames());
        if first >= last {
            return None;
        }

        let slice = AudioBuffer {
            samples: self.frame_slice(first, last).to_vec(),
            channels: self.channels,
            sample_rate: self.sample_rate,
        };
        Some(slice.to_mono())
    }
}

impl fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo(frames: &[(f32, f32)], sample_rate: u32) -> AudioBuffer {
        let samples = frames.iter().flat_map(|(l, r)| [*l, *r]).collect();
        AudioBuffer::new(samples, 2, sample_rate).unwrap()
    }

    #[test]
    fn rejects_broken_layouts() {
        assert!(AudioBuffer::new(vec![0.0; 3], 2, 44_100).is_err());
        assert!(AudioBuffer::new(vec![0.0; 4], 0, 44_100).is_err());
        assert!(AudioBuffer::new(vec![0.0; 4], 2, 0).is_err());
    }

    #[test]
    fn derives_duration_from_frames() {
        let buffer = stereo(&[(0.0, 0.0); 200], 100);
        assert_eq!(buffer.frames(), 200);
        assert!((buffer.duration() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn mono_averages_channels() {
        let buffer = stereo(&[(1.0, 0.0), (0.5, 0.5)], 10);
        assert_eq!(buffer.to_mono(), vec![0.5, 0.5]);
    }

    #[test]
    fn mono_is_duplicated_to_stereo() {
        let buffer = AudioBuffer::mono(vec![0.1, 0.2], 10).unwrap();
        let widened = buffer.to_channels(2).unwrap();
        assert_eq!(widened.samples(), &[0.1, 0.1, 0.2, 0.2]);
        assert_eq!(widened.frames(), 2);
    }

    #[test]
    fn frame_slice_clamps_to_buffer() {
        let buffer = stereo(&[(1.0, 2.0), (3.0, 4.0), (5.0, 6.0)], 10);
        assert_eq!(buffer.frame_slice(1, 10), &[3.0, 4.0, 5.0, 6.0]);
        assert!(buffer.frame_slice(5, 2).is_empty());
    }

    #[test]
    fn segment_returns_none_for_empty_ranges() {
        let buffer = AudioBuffer::mono((0..100).map(|i| i as f32).collect(), 10).unwrap();
        assert_eq!(buffer.segment(1.0, 1.5).unwrap(), vec![10.0, 11.0, 12.0, 13.0, 14.0]);
        assert!(buffer.segment(5.0, 4.0).is_none());
        assert!(buffer.segment(20.0, 30.0).is_none());
    }
}
