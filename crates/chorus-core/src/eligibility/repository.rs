//! Mute list repository trait.

use crate::error::Result;
use async_trait::async_trait;

/// Durable storage for the persistently muted persona names.
///
/// The list is stored independently of chat data so that a mute survives
/// session switches and imports. Implementations report unreadable or
/// malformed data as an empty list.
#[async_trait]
pub trait MuteListRepository: Send + Sync {
    async fn load(&self) -> Result<Vec<String>>;

    async fn save(&self, names: &[String]) -> Result<()>;
}
