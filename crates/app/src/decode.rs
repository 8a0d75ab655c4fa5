use std::path::Path;

use hound::{SampleFormat, WavReader};
use lyric_sync_core::{AudioBuffer, Result, SyncError};

/// Decodes a WAV file into an interleaved buffer normalized to `[-1, 1]`.
pub fn read_wav(path: &Path) -> Result<AudioBuffer> {
    let mut reader = WavReader::open(path).map_err(decode_error)?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(decode_error)?,
        SampleFormat::Int => {
            let scale = integer_scale(spec.bits_per_sample);
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(decode_error)?
        }
    };

    tracing::debug!(
        path = %path.display(),
        channels = spec.channels,
        sample_rate = spec.sample_rate,
        bits = spec.bits_per_sample,
        "decoded wav"
    );
    AudioBuffer::new(samples, spec.channels, spec.sample_rate)
}

fn integer_scale(bits_per_sample: u16) -> f32 {
    (1_i64 << (bits_per_sample.clamp(1, 32) - 1)) as f32
}

fn decode_error(err: hound::Error) -> SyncError {
    SyncError::msg(format!("failed to decode wav: {err}"))
}

#[cfg(test)]
mod tests {
    use hound::{WavSpec, WavWriter};

    use super::*;

    #[test]
    fn reads_integer_pcm_as_unit_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for value in [i16::MAX, i16::MIN, 0, 16_384] {
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = read_wav(&path).unwrap();
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.sample_rate(), 8000);
        assert_eq!(buffer.samples()[1], -1.0);
        assert_eq!(buffer.samples()[3], 0.5);
        assert!(buffer.samples()[0] < 1.0 && buffer.samples()[0] > 0.999);
    }

    #[test]
    fn missing_file_is_a_load_failure() {
        let err = read_wav(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(err.to_string().contains("failed to decode wav"));
    }
}
