use std::{fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{AnalysisConfig, AudioBuffer, Result, SyncError};

/// Whole-buffer statistics shown next to the waveform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaveformStats {
    pub duration: f64,
    pub sample_rate: u32,
    pub samples: usize,
    pub max_amplitude: f32,
    pub rms: f32,
    pub zero_crossings: usize,
}

/// A maximal quiet region, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SilenceInterval {
    pub start: f64,
    pub end: f64,
}

impl SilenceInterval {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Every derived feature for one window size. Always recomputable from the
/// buffer, never edited in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaveformFeatures {
    pub window_size: usize,
    /// Amplitude trace decimated for display.
    pub amplitude: Vec<f32>,
    pub rms: Vec<f32>,
    /// Spectral centroid per window, in Hz.
    pub spectral_centroid: Vec<f32>,
    pub silence: Vec<SilenceInterval>,
    /// Peak times in seconds.
    pub peaks: Vec<f64>,
}

/// Feature extraction over a mono-reduced copy of a decoded buffer.
///
/// All methods are pure: the same analyzer and the same parameters always
/// yield the same output, so results can be cached or recomputed freely by the
/// display layer.
#[derive(Clone)]
pub struct WaveformAnalyzer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl WaveformAnalyzer {
    /// Mono-reduces the buffer and keeps its sample rate.
    pub fn new(buffer: &AudioBuffer) -> Self {
        Self {
            samples: buffer.to_mono(),
            sample_rate: buffer.sample_rate(),
        }
    }

    /// Creates an analyzer directly over a mono amplitude array.
    pub fn from_mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(SyncError::InvalidInput("analysis requires a non-zero sample rate"));
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Samples between two timestamps, or `None` if the clamped range is empty.
    pub fn segment(&self, start: f64, end: f64) -> Option<&[f32]> {
        let rate = self.sample_rate as f64;
        let first = (start * rate).max(0.0) as usize;
        let last = ((end * rate).max(0.0) as usize).min(self.samples.len());
        if first >= last {
            return None;
        }
        Some(&self.samples[first..last])
    }

    /// RMS per consecutive, non-overlapping window. The last window may be
    /// shorter than `window`.
    pub fn rms_energy(&self, window: usize) -> Result<Vec<f32>> {
        check_window(window)?;
        Ok(self.samples.chunks(window).map(compute_rms).collect())
    }

    /// Magnitude-weighted mean of `|frequency|` per window, in Hz.
    pub fn spectral_centroid(&self, window: usize) -> Result<Vec<f32>> {
        check_window(window)?;

        let mut spectrum = SpectrumPlanner::new(self.sample_rate);
        self.samples
            .chunks(window)
            .map(|block| spectrum.centroid(block))
            .collect()
    }

    /// Runs of windows whose RMS stays below `threshold` for at least
    /// `min_duration` seconds.
    pub fn detect_silence(
        &self,
        threshold: f32,
        min_duration: f64,
        window: usize,
    ) -> Result<Vec<SilenceInterval>> {
        let rms = self.rms_energy(window)?;
        let rate = self.sample_rate as f64;
        let to_seconds = |index: usize| (index * window) as f64 / rate;

        let mut intervals = Vec::new();
        let mut run_start: Option<usize> = None;

        for (index, energy) in rms.iter().enumerate() {
            let silent = *energy < threshold;
            match (silent, run_start) {
                (true, None) => run_start = Some(index),
                (false, Some(start)) => {
                    run_start = None;
                    let interval = SilenceInterval {
                        start: to_seconds(start),
                        end: to_seconds(index),
                    };
                    if interval.duration() >= min_duration {
                        intervals.push(interval);
                    }
                }
                _ => {}
            }
        }

        // A run reaching the end stops at the true end of the signal, not at
        // the end of the last (possibly short) window.
        if let Some(start) = run_start {
            let interval = SilenceInterval {
                start: to_seconds(start),
                end: self.duration(),
            };
            if interval.duration() >= min_duration {
                intervals.push(interval);
            }
        }

        Ok(intervals)
    }

    /// Times of local maxima of `|y|` that reach `relative_threshold` times the
    /// global maximum.
    pub fn detect_peaks(&self, relative_threshold: f32) -> Vec<f64> {
        let max = peak_amplitude(&self.samples);
        if max <= 0.0 {
            return Vec::new();
        }

        let level = relative_threshold * max;
        let rate = self.sample_rate as f64;
        self.samples
            .windows(3)
            .enumerate()
            .filter_map(|(offset, triple)| {
                let [prev, current, next] = [triple[0].abs(), triple[1].abs(), triple[2].abs()];
                (current > prev && current > next && current >= level)
                    .then(|| (offset + 1) as f64 / rate)
            })
            .collect()
    }

    /// Linear interpolation of the trace onto `target_length` evenly spaced
    /// points spanning the first to the last sample. Display only.
    pub fn resample(&self, target_length: usize) -> Vec<f32> {
        let len = self.samples.len();
        if len == 0 || target_length == 0 {
            return Vec::new();
        }
        if len == 1 || target_length == 1 {
            return vec![self.samples[0]; target_length];
        }

        let step = (len - 1) as f64 / (target_length - 1) as f64;
        (0..target_length)
            .map(|i| {
                let position = i as f64 * step;
                let lower = (position.floor() as usize).min(len - 1);
                let upper = (lower + 1).min(len - 1);
                let fraction = (position - lower as f64) as f32;
                self.samples[lower] + (self.samples[upper] - self.samples[lower]) * fraction
            })
            .collect()
    }

    pub fn stats(&self) -> WaveformStats {
        let zero_crossings = self
            .samples
            .windows(2)
            .filter(|pair| sign(pair[0]) != sign(pair[1]))
            .count();

        WaveformStats {
            duration: self.duration(),
            sample_rate: self.sample_rate,
            samples: self.samples.len(),
            max_amplitude: peak_amplitude(&self.samples),
            rms: if self.samples.is_empty() {
                0.0
            } else {
                compute_rms(&self.samples)
            },
            zero_crossings,
        }
    }

    /// Computes the full feature set with the configured parameters.
    pub fn features(&self, config: &AnalysisConfig) -> Result<WaveformFeatures> {
        let window = config.window_size;
        let features = WaveformFeatures {
            window_size: window,
            amplitude: self.resample(config.display_width),
            rms: self.rms_energy(window)?,
            spectral_centroid: self.spectral_centroid(window)?,
            silence: self.detect_silence(
                config.silence_threshold,
                config.min_silence_duration,
                window,
            )?,
            peaks: self.detect_peaks(config.peak_threshold),
        };

        tracing::debug!(
            window,
            windows = features.rms.len(),
            silences = features.silence.len(),
            peaks = features.peaks.len(),
            "computed waveform features"
        );
        Ok(features)
    }
}

impl fmt::Debug for WaveformAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaveformAnalyzer")
            .field("sample_rate", &self.sample_rate)
            .field("samples", &self.samples.len())
            .finish()
    }
}

/// Caches one FFT plan per window length; only the trailing window of a
/// buffer normally needs a second plan.
struct SpectrumPlanner {
    sample_rate: f32,
    planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl FftResources {
    fn plan(planner: &mut RealFftPlanner<f32>, size: usize) -> Self {
        let plan = planner.plan_fft_forward(size);
        Self {
            size,
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        }
    }
}

impl SpectrumPlanner {
    fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    fn prepare_fft(&mut self, size: usize) -> &mut FftResources {
        if self.fft.as_ref().map_or(true, |fft| fft.size != size) {
            self.fft = None;
        }
        let planner = &mut self.planner;
        self.fft.get_or_insert_with(|| FftResources::plan(planner, size))
    }

    fn centroid(&mut self, block: &[f32]) -> Result<f32> {
        let len = block.len();
        // A single sample only has a DC component.
        if len < 2 {
            return Ok(0.0);
        }

        let bin_hz = self.sample_rate / len as f32;
        let fft = self.prepare_fft(len);
        fft.input.copy_from_slice(block);
        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        // The real FFT only returns the non-negative half. Interior bins stand
        // for a mirrored negative-frequency partner with the same |f|.
        let nyquist_bin = (len % 2 == 0).then_some(len / 2);
        let mut magnitude_sum = 0.0;
        let mut weighted_sum = 0.0;
        for (k, bin) in fft.spectrum.iter().enumerate() {
            let weight = if k == 0 || Some(k) == nyquist_bin { 1.0 } else { 2.0 };
            let magnitude = bin.norm() * weight;
            magnitude_sum += magnitude;
            weighted_sum += magnitude * (k as f32 * bin_hz);
        }

        if magnitude_sum <= f32::EPSILON {
            Ok(0.0)
        } else {
            Ok(weighted_sum / magnitude_sum)
        }
    }
}

fn check_window(window: usize) -> Result<()> {
    if window == 0 {
        return Err(SyncError::InvalidInput("window size must be at least one sample"));
    }
    Ok(())
}

fn compute_rms(samples: &[f32]) -> f32 {
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

fn peak_amplitude(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0, |max, sample| max.max(sample.abs()))
}

fn sign(value: f32) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}
