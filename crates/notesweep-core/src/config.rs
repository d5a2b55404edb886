use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::migrate::MigrateSettings;
use crate::store::{self, StoreError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error(transparent)]
    Token(#[from] StoreError),
    #[error("No tracker token configured (set tracker.token or tracker.token_file)")]
    MissingToken,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotesweepConfig {
    pub root_dir: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub quiet_period_secs: Option<i64>,
    /// Override for the open-item line pattern; must keep two capture groups.
    pub todo_pattern: Option<String>,
    pub migrated_marker: Option<char>,
    /// Passed to the tracker as the new task's due string, e.g. "today".
    pub due_hint: Option<String>,
    pub tracker: Option<TrackerConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub token_file: Option<String>,
}

pub fn config_filename_candidates() -> [&'static str; 2] {
    [".notesweep.toml", ".notesweeprc"]
}

pub fn config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".notesweep.toml")
}

pub fn resolve_user_home_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        let trimmed = home.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    if let Ok(profile) = std::env::var("USERPROFILE") {
        let trimmed = profile.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    None
}

pub fn resolve_notesweep_home_dir() -> Option<PathBuf> {
    if let Ok(value) = std::env::var("NOTESWEEP_HOME") {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(PathBuf::from(trimmed));
        }
    }
    resolve_user_home_dir().map(|home| home.join(".notesweep"))
}

pub fn global_config_path() -> Option<PathBuf> {
    resolve_notesweep_home_dir().map(|home| home.join("config.toml"))
}

pub fn find_config_root(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
    for candidate in start.ancestors() {
        for name in config_filename_candidates() {
            if candidate.join(name).is_file() {
                return Some(candidate.to_path_buf());
            }
        }
    }
    None
}

pub fn load_config(repo_root: &Path) -> Option<NotesweepConfig> {
    for name in config_filename_candidates() {
        let path = repo_root.join(name);
        if path.is_file() {
            if let Ok(text) = fs::read_to_string(&path) {
                if let Ok(config) = toml::from_str::<NotesweepConfig>(&text) {
                    return Some(config);
                }
            }
        }
    }
    None
}

pub fn load_global_config() -> Option<NotesweepConfig> {
    let path = global_config_path()?;
    if !path.is_file() {
        return None;
    }
    let text = fs::read_to_string(path).ok()?;
    toml::from_str::<NotesweepConfig>(&text).ok()
}

pub fn write_config(repo_root: &Path, config: &NotesweepConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path(repo_root);
    let body = toml::to_string_pretty(config)?;
    fs::write(&path, body)?;
    Ok(path)
}

/// Project config wins over global config, field by field.
pub fn resolve_config(repo_root: &Path) -> NotesweepConfig {
    let project = load_config(repo_root).unwrap_or_default();
    let global = load_global_config().unwrap_or_default();
    merge(project, global)
}

fn merge(project: NotesweepConfig, global: NotesweepConfig) -> NotesweepConfig {
    NotesweepConfig {
        root_dir: project.root_dir.or(global.root_dir),
        extensions: project.extensions.or(global.extensions),
        quiet_period_secs: project.quiet_period_secs.or(global.quiet_period_secs),
        todo_pattern: project.todo_pattern.or(global.todo_pattern),
        migrated_marker: project.migrated_marker.or(global.migrated_marker),
        due_hint: project.due_hint.or(global.due_hint),
        tracker: match (project.tracker, global.tracker) {
            (Some(project), Some(global)) => Some(TrackerConfig {
                base_url: project.base_url.or(global.base_url),
                token: project.token.or(global.token),
                token_file: project.token_file.or(global.token_file),
            }),
            (project, global) => project.or(global),
        },
    }
}

/// Build pipeline settings from a resolved config, with defaults filled in.
pub fn settings_from_config(config: &NotesweepConfig, root: PathBuf) -> MigrateSettings {
    let mut settings = MigrateSettings::new(root);
    if let Some(extensions) = config.extensions.clone().filter(|e| !e.is_empty()) {
        settings.extensions = extensions;
    }
    if let Some(secs) = config.quiet_period_secs {
        settings.quiet_period_secs = secs;
    }
    settings.todo_pattern = config.todo_pattern.clone();
    if let Some(marker) = config.migrated_marker {
        settings.migrated_marker = marker;
    }
    settings.due_hint = config.due_hint.clone();
    settings
}

/// Resolve the tracker token: inline value first, then the token file.
pub fn resolve_token(config: &NotesweepConfig) -> Result<String, ConfigError> {
    let tracker = config.tracker.clone().unwrap_or_default();
    if let Some(token) = tracker
        .token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
    {
        return Ok(token.to_string());
    }
    if let Some(file) = tracker
        .token_file
        .as_deref()
        .map(str::trim)
        .filter(|file| !file.is_empty())
    {
        return Ok(store::load_token_file(Path::new(file))?);
    }
    Err(ConfigError::MissingToken)
}

pub fn tracker_base_url(config: &NotesweepConfig) -> String {
    config
        .tracker
        .as_ref()
        .and_then(|tracker| tracker.base_url.clone())
        .unwrap_or_else(|| store::DEFAULT_BASE_URL.to_string())
}
