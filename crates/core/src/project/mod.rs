use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::{ProjectConfig, Result, TimedLine, Timeline};

pub const PROJECT_EXTENSION: &str = "aurantisproj";
pub const AUTOSAVE_EXTENSION: &str = "autosave";
pub const FORMAT_VERSION: &str = "1.0";

/// One alignment session: the recording it refers to, the transcription
/// settings used for it, and the edited timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub audio_path: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_model_size")]
    pub model_size: String,
    #[serde(default, rename = "lines")]
    pub timeline: Timeline,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            audio_path: String::new(),
            language: default_language(),
            model_size: default_model_size(),
            timeline: Timeline::new(),
        }
    }
}

impl Project {
    /// Empty project using the configured transcription defaults.
    pub fn with_config(config: &ProjectConfig) -> Self {
        Self {
            language: config.language.clone(),
            model_size: config.model_size.clone(),
            ..Default::default()
        }
    }
}

fn default_language() -> String {
    ProjectConfig::default().language
}

fn default_model_size() -> String {
    ProjectConfig::default().model_size
}

/// On-disk envelope around a [`Project`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_autosave: bool,
    #[serde(default)]
    pub project: Project,
}

fn default_version() -> String {
    FORMAT_VERSION.to_string()
}

impl ProjectFile {
    fn wrap(project: &Project, is_autosave: bool) -> Self {
        let now = Utc::now();
        Self {
            version: FORMAT_VERSION.to_string(),
            created: Some(now),
            modified: Some(now),
            is_autosave,
            project: project.clone(),
        }
    }

    fn read(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Header information about a project file, without its lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectInfo {
    pub path: PathBuf,
    pub version: String,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub audio_path: String,
    pub language: String,
    pub model_size: String,
    pub lines_count: usize,
    pub file_size: u64,
    pub is_autosave: bool,
}

/// Saves and loads projects and keeps track of unsaved changes for the
/// autosave schedule.
#[derive(Debug)]
pub struct ProjectStore {
    autosave_interval: Duration,
    current_path: Option<PathBuf>,
    last_save: Option<Instant>,
    unsaved_changes: bool,
}

impl Default for ProjectStore {
    fn default() -> Self {
        Self::new(&ProjectConfig::default())
    }
}

impl ProjectStore {
    pub fn new(config: &ProjectConfig) -> Self {
        Self {
            autosave_interval: Duration::from_secs(config.autosave_interval_secs),
            current_path: None,
            last_save: None,
            unsaved_changes: false,
        }
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved_changes
    }

    /// Writes the project, appending the project extension when missing.
    /// Returns the path actually written.
    pub fn save(&mut self, project: &Project, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = with_project_extension(path.as_ref());
        ProjectFile::wrap(project, false).write(&path)?;

        tracing::debug!(path = %path.display(), lines = project.timeline.len(), "saved project");
        self.current_path = Some(path.clone());
        self.mark_saved();
        Ok(path)
    }

    /// Reads a project. A different format version is tolerated with a
    /// warning.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<Project> {
        let path = path.as_ref();
        let file = ProjectFile::read(path)?;
        if file.version != FORMAT_VERSION {
            tracing::warn!(
                version = %file.version,
                expected = FORMAT_VERSION,
                "project version may not be compatible"
            );
        }

        self.current_path = Some(path.to_path_buf());
        self.mark_saved();
        Ok(file.project)
    }

    /// Writes the autosave sibling of the current project. Returns `false`
    /// when the project has never been saved.
    pub fn create_autosave(&self, project: &Project) -> Result<bool> {
        let Some(current) = &self.current_path else {
            return Ok(false);
        };

        let path = autosave_path(current);
        ProjectFile::wrap(project, true).write(&path)?;
        tracing::debug!(path = %path.display(), "wrote autosave");
        Ok(true)
    }

    /// Loads the autosave of `project_path`, if one exists and is flagged as
    /// an autosave.
    pub fn load_autosave(&self, project_path: impl AsRef<Path>) -> Result<Option<Project>> {
        let path = autosave_path(project_path.as_ref());
        if !path.exists() {
            return Ok(None);
        }

        let file = ProjectFile::read(&path)?;
        Ok(file.is_autosave.then_some(file.project))
    }

    /// Header information of the autosave of `project_path`, under the same
    /// rules as [`ProjectStore::load_autosave`].
    pub fn autosave_info(&self, project_path: impl AsRef<Path>) -> Result<Option<ProjectInfo>> {
        let path = autosave_path(project_path.as_ref());
        if !path.exists() {
            return Ok(None);
        }

        let info = Self::info(&path)?;
        Ok(info.is_autosave.then_some(info))
    }

    pub fn delete_autosave(&self, project_path: impl AsRef<Path>) -> Result<()> {
        let path = autosave_path(project_path.as_ref());
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn has_autosave(&self, project_path: impl AsRef<Path>) -> bool {
        autosave_path(project_path.as_ref()).exists()
    }

    /// True once the autosave interval has elapsed since the last save or
    /// load, or when nothing was saved yet.
    pub fn should_autosave(&self) -> bool {
        self.last_save
            .map_or(true, |saved| saved.elapsed() >= self.autosave_interval)
    }

    pub fn mark_modified(&mut self) {
        self.unsaved_changes = true;
    }

    pub fn mark_saved(&mut self) {
        self.unsaved_changes = false;
        self.last_save = Some(Instant::now());
    }

    /// Reads only the header information of a project file.
    pub fn info(path: impl AsRef<Path>) -> Result<ProjectInfo> {
        let path = path.as_ref();
        let file = ProjectFile::read(path)?;
        Ok(ProjectInfo {
            path: path.to_path_buf(),
            version: file.version,
            created: file.created,
            modified: file.modified,
            audio_path: file.project.audio_path,
            language: file.project.language,
            model_size: file.project.model_size,
            lines_count: file.project.timeline.len(),
            file_size: fs::metadata(path)?.len(),
            is_autosave: file.is_autosave,
        })
    }

    /// Writes a human-readable report of the project.
    pub fn write_summary(project: &Project, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, summary(project))?;
        Ok(())
    }
}

/// Plain-text project report listing every non-empty line with its times.
pub fn summary(project: &Project) -> String {
    let lines = project.timeline.lines();
    let mut out = String::new();
    let _ = writeln!(out, "=== PROJECT SUMMARY ===\n");
    let _ = writeln!(out, "Audio file: {}", project.audio_path);
    let _ = writeln!(out, "Language: {}", project.language);
    let _ = writeln!(out, "Model: {}", project.model_size);
    let _ = writeln!(out, "Total lines: {}", lines.len());
    let _ = writeln!(out, "Non-empty lines: {}\n", project.timeline.non_empty_lines().len());
    let _ = writeln!(out, "=== LINES ===");
    for (number, line) in lines.iter().enumerate() {
        if !line.is_empty() {
            let _ = writeln!(out, "{}", summary_line(number + 1, line));
        }
    }
    let _ = writeln!(
        out,
        "\nGenerated at: {}",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    out
}

fn summary_line(number: usize, line: &TimedLine) -> String {
    format!(
        "{number:3}. [{:6.2}s - {:6.2}s] {}",
        line.start, line.end, line.text
    )
}

fn with_project_extension(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|ext| ext == PROJECT_EXTENSION) {
        path.to_path_buf()
    } else {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(PROJECT_EXTENSION);
        PathBuf::from(name)
    }
}

fn autosave_path(project_path: &Path) -> PathBuf {
    project_path.with_extension(AUTOSAVE_EXTENSION)
}
