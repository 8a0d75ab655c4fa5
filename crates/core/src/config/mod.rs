use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Languages the transcription collaborator accepts.
pub const SUPPORTED_LANGUAGES: &[&str] = &["pt", "en", "es", "fr", "de", "it", "ja", "ko", "zh"];

/// Model sizes the transcription collaborator accepts.
pub const SUPPORTED_MODELS: &[&str] = &["tiny", "base", "small", "medium", "large-v3"];

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub analysis: AnalysisConfig,
    pub project: ProjectConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&raw)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded configuration");
        Ok(config)
    }

    /// Writes the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }
}

/// Configuration specific to the playback subsystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Frames submitted to the output per playback loop iteration.
    pub chunk_frames: usize,
    /// Channel layout every loaded buffer is converted to before playback.
    pub output_channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            chunk_frames: 1024,
            output_channels: 2,
        }
    }
}

/// Parameters for the waveform feature extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub window_size: usize,
    pub silence_threshold: f32,
    pub min_silence_duration: f64,
    pub peak_threshold: f32,
    /// Number of points in the decimated amplitude trace used for display.
    pub display_width: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size: 1024,
            silence_threshold: 0.01,
            min_silence_duration: 0.1,
            peak_threshold: 0.5,
            display_width: 800,
        }
    }
}

/// Defaults applied to new projects and to the autosave schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub autosave_interval_secs: u64,
    pub language: String,
    pub model_size: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            autosave_interval_secs: 30,
            language: "pt".to_string(),
            model_size: "base".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "analysis": { "window_size": 512 } }"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.analysis.window_size, 512);
        assert_eq!(config.analysis.silence_threshold, 0.01);
        assert_eq!(config.audio, AudioConfig::default());
        assert_eq!(config.project.language, "pt");
    }

    #[test]
    fn saves_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = AppConfig::default();
        config.audio.chunk_frames = 256;
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn default_project_settings_are_supported() {
        let project = ProjectConfig::default();
        assert!(SUPPORTED_LANGUAGES.contains(&project.language.as_str()));
        assert!(SUPPORTED_MODELS.contains(&project.model_size.as_str()));
    }
}
