//! Loads `chorus.toml` into a validated `GroupChatConfig`.

use crate::paths::ChorusPaths;
use chorus_core::config::GroupChatConfig;
use chorus_core::{ChorusError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding `api.key`.
pub const API_KEY_ENV_VAR: &str = "CHORUS_API_KEY";

/// Reads, overrides and validates the group chat configuration.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the config from the resolved location.
    ///
    /// Returns the config together with the path it was read from.
    pub fn load(explicit: Option<&Path>) -> Result<(GroupChatConfig, PathBuf)> {
        let path = ChorusPaths::resolve_config_file(explicit)?;
        let config = Self::load_file(&path)?;
        Ok((config, path))
    }

    /// Loads a specific file, applying environment overrides.
    pub fn load_file(path: &Path) -> Result<GroupChatConfig> {
        let content = fs::read_to_string(path).map_err(|e| {
            ChorusError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config = Self::parse(&content, std::env::var(API_KEY_ENV_VAR).ok())?;
        tracing::info!(
            "[ConfigLoader] Loaded {} personas from {}",
            config.personas.len(),
            path.display()
        );
        Ok(config)
    }

    /// Parses and validates TOML text. A non-blank `api_key_override`
    /// replaces `api.key`.
    pub fn parse(content: &str, api_key_override: Option<String>) -> Result<GroupChatConfig> {
        let mut config: GroupChatConfig = toml::from_str(content)?;

        if let Some(key) = api_key_override.filter(|key| !key.trim().is_empty()) {
            config.api.key = Some(key);
        }

        config.registry()?;
        if config.api.base_url().is_none() {
            tracing::warn!("[ConfigLoader] api.url is not set; every completion will fail");
        }

        Ok(config)
    }
}
