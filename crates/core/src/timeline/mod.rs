use std::fmt;

use serde::{Deserialize, Serialize};

use crate::TranscriptSegment;

/// One line of text aligned to `[start, end)` seconds of the recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TimedLineRecord")]
pub struct TimedLine {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl TimedLine {
    /// Builds a line, clamping a negative start to zero and replacing a
    /// non-positive duration with one second.
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        let start = start.max(0.0);
        let end = if end <= start { start + 1.0 } else { end };
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// True when the text is blank after trimming.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Persisted shape of a line. Missing fields default like a fresh line and the
/// result is clamped through [`TimedLine::new`].
#[derive(Deserialize)]
struct TimedLineRecord {
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(default)]
    text: String,
}

impl From<TimedLineRecord> for TimedLine {
    fn from(record: TimedLineRecord) -> Self {
        TimedLine::new(record.start, record.end, record.text)
    }
}

/// Problem found by [`Timeline::validate`]. Indices are zero-based; the
/// `Display` output numbers lines from one like the line table does.
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    NegativeStart { index: usize, start: f64 },
    NonPositiveDuration { index: usize, start: f64, end: f64 },
    Overlap { index: usize, end: f64, next_start: f64 },
}

impl Violation {
    pub fn index(&self) -> usize {
        match self {
            Violation::NegativeStart { index, .. }
            | Violation::NonPositiveDuration { index, .. }
            | Violation::Overlap { index, .. } => *index,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::NegativeStart { index, start } => {
                write!(f, "line {}: negative start time ({start})", index + 1)
            }
            Violation::NonPositiveDuration { index, start, end } => write!(
                f,
                "line {}: end must be after start ({start} -> {end})",
                index + 1
            ),
            Violation::Overlap {
                index,
                end,
                next_start,
            } => write!(
                f,
                "line {}: overlaps the next line ({end} > {next_start})",
                index + 1
            ),
        }
    }
}

/// Ordered collection of [`TimedLine`]s for one session.
///
/// Lines are only reachable through the timeline's methods. Out-of-range
/// indices and invalid split or merge targets are ignored rather than
/// reported, so interactive edits can never leave the model half-applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    lines: Vec<TimedLine>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a normalized timeline from persisted or transcribed lines.
    pub fn from_lines(lines: impl IntoIterator<Item = TimedLine>) -> Self {
        let mut timeline = Self {
            lines: lines.into_iter().collect(),
        };
        timeline.normalize();
        timeline
    }

    /// Converts transcription output into lines. Blank segments are dropped,
    /// a missing start becomes zero and a missing end becomes half a second
    /// after the start.
    pub fn from_segments(segments: impl IntoIterator<Item = TranscriptSegment>) -> Self {
        Self::from_lines(segments.into_iter().filter_map(|segment| {
            let text = segment.text.trim();
            if text.is_empty() {
                return None;
            }
            let start = segment.start.unwrap_or(0.0);
            let end = segment.end.unwrap_or(start + 0.5);
            Some(TimedLine::new(start, end, text))
        }))
    }

    pub fn lines(&self) -> &[TimedLine] {
        &self.lines
    }

    pub fn get(&self, index: usize) -> Option<&TimedLine> {
        self.lines.get(index)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn into_lines(self) -> Vec<TimedLine> {
        self.lines
    }

    /// Appends a line and re-normalizes, so it may land anywhere.
    pub fn add_line(&mut self, line: TimedLine) {
        self.lines.push(line);
        self.normalize();
    }

    /// Inserts at `index` (`0..=len`) and re-normalizes.
    pub fn insert_line(&mut self, index: usize, line: TimedLine) {
        if index > self.lines.len() {
            return;
        }
        self.lines.insert(index, line);
        self.normalize();
    }

    pub fn remove_line(&mut self, index: usize) -> Option<TimedLine> {
        (index < self.lines.len()).then(|| self.lines.remove(index))
    }

    /// Splits the line at `at_time` when it falls strictly inside it. Both
    /// halves keep the full original text.
    pub fn split_line(&mut self, index: usize, at_time: f64) {
        let Some(line) = self.lines.get_mut(index) else {
            return;
        };
        if !(line.start < at_time && at_time < line.end) {
            return;
        }

        let second = TimedLine {
            start: at_time,
            end: line.end,
            text: line.text.clone(),
        };
        line.end = at_time;
        self.insert_line(index + 1, second);
    }

    /// Joins a line with its successor. The merged line spans both and its
    /// text is the two trimmed texts separated by a space.
    pub fn merge_lines(&mut self, index: usize) {
        if index + 1 >= self.lines.len() {
            return;
        }

        let next = self.lines.remove(index + 1);
        let current = &mut self.lines[index];
        current.text = format!("{} {}", current.text.trim(), next.text.trim());
        current.end = next.end;
    }

    /// Replaces the text of a line without touching its times.
    pub fn set_text(&mut self, index: usize, text: impl Into<String>) {
        if let Some(line) = self.lines.get_mut(index) {
            line.text = text.into();
        }
    }

    /// Uses a playback position as the start of a line. No normalization is
    /// run; [`Timeline::validate`] reports any resulting conflict.
    pub fn capture_start(&mut self, index: usize, position: f64) {
        if let Some(line) = self.lines.get_mut(index) {
            line.start = position;
        }
    }

    /// Uses a playback position as the end of a line.
    pub fn capture_end(&mut self, index: usize, position: f64) {
        if let Some(line) = self.lines.get_mut(index) {
            line.end = position;
        }
    }

    /// Sorts by start and clips each line's end to the next line's start.
    ///
    /// Starts never move. When two lines share a start (or an edit left a
    /// start out of order before the sort) the earlier line can be clipped to
    /// a zero duration; such lines are left in place and surface through
    /// [`Timeline::validate`].
    pub fn normalize(&mut self) {
        self.lines.sort_by(|a, b| a.start.total_cmp(&b.start));

        for i in 1..self.lines.len() {
            let next_start = self.lines[i].start;
            let current = &mut self.lines[i - 1];
            if current.end > next_start {
                current.end = next_start;
            }
        }
    }

    /// Lines whose trimmed text is not blank, in timeline order.
    pub fn non_empty_lines(&self) -> Vec<&TimedLine> {
        self.lines.iter().filter(|line| !line.is_empty()).collect()
    }

    /// Reports negative starts, non-positive durations and overlaps with the
    /// following line.
    pub fn validate(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        for (index, line) in self.lines.iter().enumerate() {
            if line.start < 0.0 {
                violations.push(Violation::NegativeStart {
                    index,
                    start: line.start,
                });
            }
            if line.end <= line.start {
                violations.push(Violation::NonPositiveDuration {
                    index,
                    start: line.start,
                    end: line.end,
                });
            }
            if let Some(next) = self.lines.get(index + 1) {
                if line.end > next.start {
                    violations.push(Violation::Overlap {
                        index,
                        end: line.end,
                        next_start: next.start,
                    });
                }
            }
        }

        violations
    }
}
