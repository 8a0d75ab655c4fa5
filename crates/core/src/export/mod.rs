use std::{
    collections::BTreeMap,
    fmt::{self, Write as _},
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::Serialize;

use crate::{Result, SyncError, TimedLine, Timeline};

/// Subtitle and lyric formats the timeline can be written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExportFormat {
    Txt,
    Srt,
    Lrc,
    Vtt,
    Json,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Txt,
        ExportFormat::Srt,
        ExportFormat::Lrc,
        ExportFormat::Vtt,
        ExportFormat::Json,
    ];

    /// Human readable name for menus.
    pub fn name(self) -> &'static str {
        match self {
            ExportFormat::Txt => "Plain Text",
            ExportFormat::Srt => "SRT Subtitles",
            ExportFormat::Lrc => "LRC Lyrics",
            ExportFormat::Vtt => "WebVTT",
            ExportFormat::Json => "JSON",
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Srt => "srt",
            ExportFormat::Lrc => "lrc",
            ExportFormat::Vtt => "vtt",
            ExportFormat::Json => "json",
        }
    }

    /// Formats the given lines. Lines with blank text are skipped and the
    /// remaining text is trimmed (JSON keeps the text verbatim).
    pub fn render<'a>(self, lines: impl IntoIterator<Item = &'a TimedLine>) -> Result<String> {
        let lines: Vec<&TimedLine> = lines.into_iter().filter(|line| !line.is_empty()).collect();
        let mut out = String::new();

        match self {
            ExportFormat::Txt => {
                for line in lines {
                    let _ = writeln!(out, "{}", line.text.trim());
                }
            }
            ExportFormat::Srt => {
                for (number, line) in lines.into_iter().enumerate() {
                    let _ = write!(
                        out,
                        "{}\n{} --> {}\n{}\n\n",
                        number + 1,
                        srt_time(line.start),
                        srt_time(line.end),
                        line.text.trim()
                    );
                }
            }
            ExportFormat::Lrc => {
                for line in lines {
                    let _ = writeln!(out, "[{}]{}", lrc_time(line.start), line.text.trim());
                }
            }
            ExportFormat::Vtt => {
                out.push_str("WEBVTT\n\n");
                for line in lines {
                    let _ = write!(
                        out,
                        "{} --> {}\n{}\n\n",
                        vtt_time(line.start),
                        vtt_time(line.end),
                        line.text.trim()
                    );
                }
            }
            ExportFormat::Json => {
                out = serde_json::to_string_pretty(&lines)?;
            }
        }

        Ok(out)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim().trim_start_matches('.');
        ExportFormat::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(value))
            .ok_or_else(|| SyncError::Export(format!("unsupported format: {value}")))
    }
}

impl Serialize for ExportFormat {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.extension())
    }
}

/// Writes the timeline in `format`. A path without an extension gets the
/// format's extension. Fails when there is no line with text to export.
pub fn export(timeline: &Timeline, path: impl AsRef<Path>, format: ExportFormat) -> Result<PathBuf> {
    let lines = timeline.non_empty_lines();
    if lines.is_empty() {
        return Err(SyncError::Export("no lines with text to export".into()));
    }

    let path = path.as_ref();
    let path = if path.extension().is_none() {
        path.with_extension(format.extension())
    } else {
        path.to_path_buf()
    };

    fs::write(&path, format.render(lines)?)?;
    tracing::debug!(%format, path = %path.display(), "exported timeline");
    Ok(path)
}

/// Exports every format next to `base_path`. Formats that fail are logged and
/// left out of the returned map.
pub fn export_all(timeline: &Timeline, base_path: impl AsRef<Path>) -> BTreeMap<ExportFormat, PathBuf> {
    let base_path = base_path.as_ref();
    let mut written = BTreeMap::new();

    for format in ExportFormat::ALL {
        let path = base_path.with_extension(format.extension());
        match export(timeline, &path, format) {
            Ok(path) => {
                written.insert(format, path);
            }
            Err(err) => tracing::warn!(%format, %err, "export failed"),
        }
    }

    written
}

/// `HH:MM:SS,mmm`
pub fn srt_time(seconds: f64) -> String {
    let (hours, minutes, secs, millis) = split_time(seconds);
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}

/// `HH:MM:SS.mmm`
pub fn vtt_time(seconds: f64) -> String {
    let (hours, minutes, secs, millis) = split_time(seconds);
    format!("{hours:02}:{minutes:02}:{secs:02}.{millis:03}")
}

/// `MM:SS.xx` with hundredths; minutes keep counting past the hour.
pub fn lrc_time(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let whole = seconds.trunc() as u64;
    let hundredths = ((seconds - seconds.trunc()) * 100.0) as u64;
    format!("{:02}:{:02}.{hundredths:02}", whole / 60, whole % 60)
}

fn split_time(seconds: f64) -> (u64, u64, u64, u64) {
    let seconds = seconds.max(0.0);
    let whole = seconds.trunc() as u64;
    let millis = ((seconds - seconds.trunc()) * 1000.0) as u64;
    (whole / 3600, (whole % 3600) / 60, whole % 60, millis)
}
