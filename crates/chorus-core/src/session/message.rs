//! Chat message types.
//!
//! A message is authored either by the human user or by a persona and
//! carries text, an image reference, or both.

use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the human participant.
    User,
    /// Message from a persona (including error replies).
    Assistant,
}

/// The payload of a message.
///
/// `image` holds a URL or a `data:` URI. A well-formed message has at least
/// one of the two fields set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl MessageContent {
    /// Text-only content.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    /// Text plus an optional image.
    pub fn with_image(text: Option<String>, image: Option<String>) -> Self {
        Self { text, image }
    }

    /// Returns the text if it is present and not blank.
    pub fn non_empty_text(&self) -> Option<&str> {
        self.text.as_deref().filter(|text| !text.is_empty())
    }

    /// Returns the image if it is present and not blank.
    pub fn non_empty_image(&self) -> Option<&str> {
        self.image.as_deref().filter(|image| !image.is_empty())
    }

    /// True when neither text nor image carries anything.
    pub fn is_empty(&self) -> bool {
        self.non_empty_text().is_none() && self.non_empty_image().is_none()
    }
}

/// A single entry in a session history.
///
/// The ordinal position of a message is its index in the history vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    /// Speaker display name
    pub name: String,
    #[serde(default)]
    pub content: MessageContent,
}

impl ChatMessage {
    /// A message written by the human participant.
    pub fn user(name: impl Into<String>, content: MessageContent) -> Self {
        Self {
            role: MessageRole::User,
            name: name.into(),
            content,
        }
    }

    /// A text reply written by a persona.
    pub fn assistant(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            name: name.into(),
            content: MessageContent::text(text),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == MessageRole::User
    }

    /// The text part, or an empty string.
    pub fn text(&self) -> &str {
        self.content.text.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let message = ChatMessage::user("Ryan", MessageContent::text("hi"));
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "user", "name": "Ryan", "content": {"text": "hi"}})
        );
    }

    #[test]
    fn test_image_only_content_is_not_empty() {
        let content = MessageContent::with_image(None, Some("data:image/png;base64,AAA".into()));
        assert!(!content.is_empty());
        assert!(content.non_empty_text().is_none());
        assert!(MessageContent::default().is_empty());
    }
}
