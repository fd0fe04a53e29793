//! Persona responder contract.
//!
//! The orchestrator drives one responder call per selected persona. The
//! completion client in `chorus-interaction` is the production implementation.

use crate::persona::Persona;
use crate::render::ChatRenderer;
use crate::session::ChatMessage;
use async_trait::async_trait;

/// The outcome of one persona invocation.
///
/// Failures are already folded into `message` as error text, so a reply
/// always exists.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonaReply {
    /// Assistant message to commit, with any quit marker removed
    pub message: ChatMessage,
    /// The persona asked to sit out the next round
    pub opted_out: bool,
    /// The reply reports a failure rather than model output
    pub is_error: bool,
}

impl PersonaReply {
    pub fn success(persona: &str, text: impl Into<String>, opted_out: bool) -> Self {
        Self {
            message: ChatMessage::assistant(persona, text),
            opted_out,
            is_error: false,
        }
    }

    pub fn error(persona: &str, text: impl Into<String>) -> Self {
        Self {
            message: ChatMessage::assistant(persona, text),
            opted_out: false,
            is_error: true,
        }
    }
}

/// Produces a persona's reply to a conversation.
#[async_trait]
pub trait PersonaResponder: Send + Sync {
    /// Generates the reply of `persona` to `history`, rendering progress
    /// through `renderer`. Never fails.
    async fn respond(
        &self,
        persona: &Persona,
        history: &[ChatMessage],
        renderer: &dyn ChatRenderer,
    ) -> PersonaReply;
}
