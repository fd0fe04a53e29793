//! Path management for chorus configuration and data files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/chorus/              # Config directory
//! └── chorus.toml                # Personas, prompts, API settings
//!
//! ~/.local/share/chorus/         # Data directory
//! ├── store/                     # Blob store, one JSON file per key
//! │   ├── chatData.json
//! │   └── persistentlyMutedAiNames.json
//! └── logs/                      # Rolling log files
//! ```

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "CHORUS_CONFIG";

const APP_DIR: &str = "chorus";
const CONFIG_FILE: &str = "chorus.toml";

/// Errors that can occur during path resolution.
#[derive(Debug, Error)]
pub enum PathError {
    /// The platform config directory could not be determined.
    #[error("Cannot find config directory")]
    ConfigDirNotFound,
    /// The platform data directory could not be determined.
    #[error("Cannot find data directory")]
    DataDirNotFound,
}

impl From<PathError> for chorus_core::ChorusError {
    fn from(err: PathError) -> Self {
        chorus_core::ChorusError::io(err.to_string())
    }
}

/// Resolves platform paths for chorus.
pub struct ChorusPaths;

impl ChorusPaths {
    /// `<config_dir>/chorus`
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::ConfigDirNotFound)
    }

    /// `<data_dir>/chorus`
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::DataDirNotFound)
    }

    /// Default location of `chorus.toml`.
    pub fn default_config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Directory backing the file blob store.
    pub fn store_dir() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("store"))
    }

    /// Directory for rolling log files.
    pub fn log_dir() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("logs"))
    }

    /// Picks the config file: explicit path, then `$CHORUS_CONFIG`, then
    /// the default location.
    pub fn resolve_config_file(explicit: Option<&Path>) -> Result<PathBuf, PathError> {
        Self::resolve_config_file_with(explicit, std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
    }

    fn resolve_config_file_with(
        explicit: Option<&Path>,
        from_env: Option<PathBuf>,
    ) -> Result<PathBuf, PathError> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        match from_env.filter(|path| !path.as_os_str().is_empty()) {
            Some(path) => Ok(path),
            None => Self::default_config_file(),
        }
    }
}
