//! BlobStore-backed MuteListRepository implementation.

use crate::storage::BlobStore;
use async_trait::async_trait;
use chorus_core::Result;
use chorus_core::eligibility::MuteListRepository;
use std::sync::Arc;

/// Blob key holding the muted persona names.
pub const MUTED_NAMES_KEY: &str = "persistentlyMutedAiNames";

/// Stores the mute list as a JSON array of names.
pub struct BlobMuteListRepository {
    store: Arc<dyn BlobStore>,
}

impl BlobMuteListRepository {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MuteListRepository for BlobMuteListRepository {
    async fn load(&self) -> Result<Vec<String>> {
        let Some(raw) = self.store.get(MUTED_NAMES_KEY).await? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(names) => Ok(names),
            Err(e) => {
                tracing::warn!(
                    "[BlobMuteListRepository] Stored mute list is invalid, clearing: {}",
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, names: &[String]) -> Result<()> {
        let raw = serde_json::to_string(names)?;
        self.store.set(MUTED_NAMES_KEY, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;

    #[tokio::test]
    async fn test_round_trip() {
        let store = Arc::new(MemoryBlobStore::new());
        let repo = BlobMuteListRepository::new(store.clone());
        assert!(repo.load().await.unwrap().is_empty());

        repo.save(&["Ann".to_string(), "猫娘小克".to_string()])
            .await
            .unwrap();
        assert_eq!(
            store.get(MUTED_NAMES_KEY).await.unwrap().as_deref(),
            Some(r#"["Ann","猫娘小克"]"#)
        );
        assert_eq!(repo.load().await.unwrap(), vec!["Ann", "猫娘小克"]);
    }

    #[tokio::test]
    async fn test_non_array_resets_to_empty() {
        let store = Arc::new(MemoryBlobStore::new());
        store.set(MUTED_NAMES_KEY, r#"{"Ann": true}"#).await.unwrap();
        let repo = BlobMuteListRepository::new(store);
        assert!(repo.load().await.unwrap().is_empty());
    }
}
