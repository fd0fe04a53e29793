//! Rendering collaborator contract.

use crate::session::MessageContent;

/// Receives chat bubbles and streaming updates.
///
/// Markup, markdown and image previews are the implementor's concern. Calls
/// arrive from the single in-flight round, in order.
pub trait ChatRenderer: Send + Sync {
    /// Shows a new bubble. `is_loading` marks a placeholder that later
    /// receives [`ChatRenderer::update_message`] calls.
    fn append_message(&self, speaker: &str, content: &MessageContent, is_user: bool, is_loading: bool);

    /// Replaces the text of the speaker's loading bubble. The last call for a
    /// bubble is a [`BubbleUpdate::Final`].
    fn update_message(&self, speaker: &str, text: &str, update: BubbleUpdate);
}

/// What an update to a loading bubble carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleUpdate {
    /// Reply text received so far; more is on the way.
    Partial,
    /// A notice shown in place of the reply, such as a reconnect attempt.
    Status,
    /// The reply as stored; the bubble is complete.
    Final,
}

/// Renderer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl ChatRenderer for NullRenderer {
    fn append_message(&self, _speaker: &str, _content: &MessageContent, _is_user: bool, _is_loading: bool) {}

    fn update_message(&self, _speaker: &str, _text: &str, _update: BubbleUpdate) {}
}
