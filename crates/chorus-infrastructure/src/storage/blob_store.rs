//! Key to serialized-string storage.

use super::atomic_file::AtomicTextFile;
use async_trait::async_trait;
use chorus_core::{ChorusError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Simple get/set/remove of string blobs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// One `<key>.json` file per key under a base directory.
///
/// Writes are atomic and serialized through a lock file, so two processes
/// sharing the directory never interleave a write.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    base_dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Store under the platform data directory.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(crate::paths::ChorusPaths::store_dir()?))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn file_for(&self, key: &str) -> Result<AtomicTextFile> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ChorusError::data_access(format!("invalid blob key '{}'", key)));
        }
        Ok(AtomicTextFile::new(self.base_dir.join(format!("{}.json", key))))
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ChorusError::internal(format!("blob store task failed: {}", e)))?
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let file = self.file_for(key)?;
        blocking(move || file.load()).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let file = self.file_for(key)?;
        let value = value.to_string();
        blocking(move || file.update(|_| Ok(Some(value)))).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let file = self.file_for(key)?;
        blocking(move || file.update(|_| Ok(None))).await
    }
}

/// In-memory store for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_blobs<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> Result<T> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| ChorusError::internal("memory blob store poisoned"))?;
        Ok(f(&mut blobs))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_blobs(|blobs| blobs.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_blobs(|blobs| {
            blobs.insert(key.to_string(), value.to_string());
        })
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.with_blobs(|blobs| {
            blobs.remove(key);
        })
    }
}
