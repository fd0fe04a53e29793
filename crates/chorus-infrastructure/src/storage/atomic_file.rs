//! Atomic text file operations.
//!
//! Writes go to a sibling temp file that is synced and renamed over the
//! target, so readers only ever see a complete old or a complete new file.

use chorus_core::{ChorusError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// A text file written with tmp file + fsync + rename.
#[derive(Debug, Clone)]
pub struct AtomicTextFile {
    path: PathBuf,
}

impl AtomicTextFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file. A missing or blank file is `None`.
    pub fn load(&self) -> Result<Option<String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(content))
    }

    /// Replaces the file contents atomically.
    pub fn save(&self, content: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(content.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Read-modify-write under an exclusive lock.
    ///
    /// `f` receives the current contents (`None` if absent) and returns the
    /// new contents, or `None` to delete the file.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(Option<String>) -> Result<Option<String>>,
    {
        let _lock = FileLock::acquire(&self.path)?;

        match f(self.load()?)? {
            Some(content) => self.save(&content),
            None => self.remove(),
        }
    }

    /// Deletes the file; a missing file is not an error.
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| ChorusError::io(format!("{} has no parent directory", self.path.display())))?;
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| ChorusError::io(format!("{} has no file name", self.path.display())))?;

        Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
    }
}

/// Exclusive lock on `<path>.lock`, released on drop.
struct FileLock {
    _file: File,
    lock_path: PathBuf,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive()
                .map_err(|e| ChorusError::io(format!("Failed to acquire lock: {}", e)))?;
        }

        Ok(FileLock {
            _file: file,
            lock_path,
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicTextFile::new(temp_dir.path().join("nested/data.json"));

        file.save("{\"a\":1}").unwrap();
        assert_eq!(file.load().unwrap().as_deref(), Some("{\"a\":1}"));
        assert!(!temp_dir.path().join("nested/.data.json.tmp").exists());
    }

    #[test]
    fn test_missing_and_blank_files_load_as_none() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicTextFile::new(temp_dir.path().join("data.json"));
        assert!(file.load().unwrap().is_none());

        fs::write(file.path(), "  \n").unwrap();
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_update_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let file = AtomicTextFile::new(temp_dir.path().join("counter.txt"));

        for _ in 0..3 {
            file.update(|current| {
                let n: u32 = current.as_deref().map_or(0, |s| s.trim().parse().unwrap_or(0));
                Ok(Some((n + 1).to_string()))
            })
            .unwrap();
        }
        assert_eq!(file.load().unwrap().as_deref(), Some("3"));
        assert!(!temp_dir.path().join("counter.lock").exists());

        file.update(|_| Ok(None)).unwrap();
        assert!(!file.path().exists());
        file.remove().unwrap();
    }
}
