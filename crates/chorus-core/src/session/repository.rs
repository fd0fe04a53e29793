//! Session repository trait.
//!
//! Defines the interface for chat-data persistence.

use super::model::ChatData;
use crate::error::Result;
use async_trait::async_trait;

/// An abstract repository for the persisted chat store.
///
/// The whole store is read and written as one unit, matching a key-value
/// backend that holds a single serialized blob.
///
/// # Implementation Notes
///
/// `load` must never fail because of bad stored data: a missing, unparsable
/// or structurally invalid blob is reported as `ChatData::default()`.
/// Errors are reserved for the backend itself being unreachable.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Loads the chat store.
    async fn load(&self) -> Result<ChatData>;

    /// Replaces the stored chat store with `data`.
    async fn save(&self, data: &ChatData) -> Result<()>;
}
