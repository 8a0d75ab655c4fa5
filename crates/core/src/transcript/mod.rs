use serde::{Deserialize, Serialize};

use crate::{AudioBuffer, Result};

/// A time-stamped span of recognised text as emitted by a speech-to-text
/// engine. Engines may omit either timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: Option<f64>,
    pub end: Option<f64>,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: Option<f64>, end: Option<f64>, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Speech-to-text engine consumed as a black box.
///
/// Implementations receive the decoded recording plus the language code and
/// model size chosen for the project, and return segments in any order; the
/// caller turns them into a timeline with
/// [`Timeline::from_segments`](crate::Timeline::from_segments).
pub trait Transcriber {
    fn transcribe(
        &self,
        audio: &AudioBuffer,
        language: &str,
        model_size: &str,
    ) -> Result<Vec<TranscriptSegment>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timeline;

    struct FixedTranscriber(Vec<TranscriptSegment>);

    impl Transcriber for FixedTranscriber {
        fn transcribe(&self, _: &AudioBuffer, _: &str, _: &str) -> Result<Vec<TranscriptSegment>> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn transcriber_output_feeds_a_normalized_timeline() {
        let engine = FixedTranscriber(vec![
            TranscriptSegment::new(Some(4.0), Some(6.0), "second"),
            TranscriptSegment::new(Some(0.0), Some(5.0), "first"),
        ]);
        let audio = AudioBuffer::mono(vec![0.0; 80], 10).unwrap();

        let segments = engine.transcribe(&audio, "en", "base").unwrap();
        let timeline = Timeline::from_segments(segments);

        assert_eq!(timeline.lines()[0].text, "first");
        assert_eq!(timeline.lines()[0].end, 4.0);
        assert!(timeline.validate().is_empty());
    }
}
