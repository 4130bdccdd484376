//! Application configuration (users settings)
//!
//! Stored as pretty JSON in the platform config directory. A missing file
//! just means defaults.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::media::thumbnail::DEFAULT_MAX_THUMBNAIL_BYTES;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a config directory for this user")]
    NoConfigDir,

    #[error("config I/O failed for {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("config file {path} is not valid: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default tracing filter, e.g. "info" or "nowplaying=debug". RUST_LOG wins.
    pub log_level: String,

    /// Also write a daily rolling log file to the data directory
    pub log_to_file: bool,

    /// Thumbnails bigger than this are refused instead of decoded
    pub max_thumbnail_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: false,
            max_thumbnail_bytes: DEFAULT_MAX_THUMBNAIL_BYTES,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "BeSpec", "nowplaying")
}

/// Where logs go when `log_to_file` is on
pub fn log_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_local_dir().join("logs"))
}

impl Config {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        project_dirs()
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from the default location, falling back to defaults if there is no file yet
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(ConfigError::Io { path: path.to_path_buf(), source }),
        };
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        fs::write(path, json).map_err(io_err)?;
        tracing::debug!("[Config] Saved to {}", path.display());
        Ok(())
    }
}
