//! BlobStore-backed SessionRepository implementation.

use crate::storage::BlobStore;
use async_trait::async_trait;
use chorus_core::Result;
use chorus_core::session::{ChatData, SessionRepository};
use std::sync::Arc;

/// Blob key holding the serialized chat store.
pub const CHAT_DATA_KEY: &str = "chatData";

/// Stores the whole chat store as one JSON blob under [`CHAT_DATA_KEY`].
///
/// ```text
/// {"sessions": {"<id>": {"name": "...", "history": [...]}}, "activeSessionId": "<id>"}
/// ```
pub struct BlobSessionRepository {
    store: Arc<dyn BlobStore>,
}

impl BlobSessionRepository {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SessionRepository for BlobSessionRepository {
    async fn load(&self) -> Result<ChatData> {
        let Some(raw) = self.store.get(CHAT_DATA_KEY).await? else {
            tracing::debug!("[BlobSessionRepository] No stored chat data");
            return Ok(ChatData::default());
        };

        match serde_json::from_str::<ChatData>(&raw) {
            Ok(data) => {
                tracing::debug!(
                    "[BlobSessionRepository] Loaded {} sessions",
                    data.sessions.len()
                );
                Ok(data)
            }
            Err(e) => {
                tracing::warn!(
                    "[BlobSessionRepository] Stored chat data is invalid, starting empty: {}",
                    e
                );
                Ok(ChatData::default())
            }
        }
    }

    async fn save(&self, data: &ChatData) -> Result<()> {
        let raw = serde_json::to_string(data)?;
        self.store.set(CHAT_DATA_KEY, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileBlobStore, MemoryBlobStore};
    use chorus_core::session::{ChatMessage, MessageContent, Session};
    use tempfile::TempDir;

    fn sample() -> ChatData {
        let mut session = Session::new("聊天 2024-05-01 10:00:00");
        session
            .history
            .push(ChatMessage::user("Ryan", MessageContent::text("hi")));
        session.history.push(ChatMessage::assistant("Ann", "hello"));

        let mut data = ChatData::default();
        data.sessions.insert("session_1_abcde".to_string(), session);
        data.active_session_id = Some("session_1_abcde".to_string());
        data
    }

    #[tokio::test]
    async fn test_missing_blob_loads_default() {
        let repo = BlobSessionRepository::new(Arc::new(MemoryBlobStore::new()));
        assert_eq!(repo.load().await.unwrap(), ChatData::default());
    }

    #[tokio::test]
    async fn test_invalid_blob_resets_to_default() {
        let store = Arc::new(MemoryBlobStore::new());
        store.set(CHAT_DATA_KEY, "{not json").await.unwrap();
        let repo = BlobSessionRepository::new(store.clone());
        assert_eq!(repo.load().await.unwrap(), ChatData::default());

        store
            .set(CHAT_DATA_KEY, r#"{"sessions": [1, 2, 3]}"#)
            .await
            .unwrap();
        assert_eq!(repo.load().await.unwrap(), ChatData::default());
    }

    #[tokio::test]
    async fn test_persisted_shape() {
        let store = Arc::new(MemoryBlobStore::new());
        let repo = BlobSessionRepository::new(store.clone());
        repo.save(&sample()).await.unwrap();

        let raw = store.get(CHAT_DATA_KEY).await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["activeSessionId"], "session_1_abcde");
        let history = &value["sessions"]["session_1_abcde"]["history"];
        assert_eq!(history[0]["role"], "user");
        assert_eq!(history[0]["content"]["text"], "hi");
        assert!(history[0]["content"].get("image").is_none());
        assert_eq!(history[1]["name"], "Ann");
    }

    #[tokio::test]
    async fn test_file_backed_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let repo = BlobSessionRepository::new(Arc::new(FileBlobStore::new(temp_dir.path())));

        repo.save(&sample()).await.unwrap();
        let reopened = BlobSessionRepository::new(Arc::new(FileBlobStore::new(temp_dir.path())));
        assert_eq!(reopened.load().await.unwrap(), sample());
    }
}
