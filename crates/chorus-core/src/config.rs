//! Group chat configuration model.
//!
//! A loaded `GroupChatConfig` is a read-only snapshot for the lifetime of a
//! chat session. Loading and environment overrides live in the
//! infrastructure crate.

use crate::error::Result;
use crate::persona::{Persona, PersonaRegistry};
use crate::selection::ChatMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_active_limit() -> usize {
    5
}

fn default_user_name() -> String {
    "User".to_string()
}

/// Root of `chorus.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct GroupChatConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub personas: Vec<Persona>,
}

impl GroupChatConfig {
    /// Builds the persona registry, rejecting empty or duplicate persona lists.
    pub fn registry(&self) -> Result<PersonaRegistry> {
        PersonaRegistry::new(self.personas.clone(), self.chat.active_limit)
    }
}

/// Completion endpoint settings.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Base URL; `/v1/chat/completions` is appended
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Global switch between streamed and whole-response delivery
    #[serde(default)]
    pub streaming: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            timeout_secs: default_timeout_secs(),
            streaming: false,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// The configured URL, if it is non-blank.
    pub fn base_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Chat behavior settings.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ChatConfig {
    #[serde(default)]
    pub mode: ChatMode,
    /// How many personas, from the top of the list, take part
    #[serde(default = "default_active_limit")]
    pub active_limit: usize,
    /// Display name of the human participant
    #[serde(default = "default_user_name")]
    pub user_name: String,
    #[serde(default)]
    pub user_prompt: String,
    /// Shared group prompt; `{{Date::time}}` is replaced with the current time
    #[serde(default)]
    pub group_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            mode: ChatMode::default(),
            active_limit: default_active_limit(),
            user_name: default_user_name(),
            user_prompt: String::new(),
            group_prompt: String::new(),
        }
    }
}
