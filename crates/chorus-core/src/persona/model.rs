//! Persona domain model.
//!
//! A persona is one configured AI participant of the group chat: its own
//! model, sampling parameters, prompts and capability flags.

use serde::{Deserialize, Serialize};

/// Separators accepted between entries of a persona tag list.
const TAG_SEPARATORS: [char; 3] = [',', '，', '、'];

/// An AI chat participant.
///
/// `name` is both the stable identifier and the display name; it must be
/// unique within a registry.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Persona {
    /// Unique display name
    pub name: String,
    /// Comma-separated keyword labels used for speaker matching
    #[serde(default)]
    pub tags: String,
    /// Model identifier sent to the completion endpoint
    pub model: String,
    #[serde(default)]
    pub max_input_tokens: Option<u32>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Appended to the shared system message for this persona only
    #[serde(default)]
    pub system_prompt: String,
    /// Sent as a trailing user message whenever this persona is invoked
    #[serde(default)]
    pub invite_prompt: String,
    #[serde(default)]
    pub supports_image: bool,
    #[serde(default)]
    pub supports_web_search: bool,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Persona {
    /// Creates a persona with the given name and model and no optional settings.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: String::new(),
            model: model.into(),
            max_input_tokens: None,
            max_output_tokens: None,
            temperature: None,
            system_prompt: String::new(),
            invite_prompt: String::new(),
            supports_image: false,
            supports_web_search: false,
            avatar: None,
        }
    }

    /// Sets the raw tag list.
    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    /// Returns the individual tags, trimmed, with empty entries dropped.
    ///
    /// Both ASCII and full-width commas separate entries.
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(TAG_SEPARATORS)
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}
