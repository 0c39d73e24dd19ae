//! In-memory [`StorageDriver`].

use async_trait::async_trait;
use dashmap::DashMap;

use super::{StorageDriver, StorageError, StoredFile};

/// Files held in a `DashMap`, keyed by normalized path.
///
/// Directories are implicit: a path is a directory if some file lives
/// beneath it. This is the default driver of a new client.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    files: DashMap<String, Vec<u8>>,
}

impl MemoryDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `bytes` at `path`, replacing any previous contents.
    pub fn put(&self, path: &str, bytes: impl Into<Vec<u8>>) {
        self.files.insert(normalize(path), bytes.into());
    }

    /// Removes the file at `path`, returning whether it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.files.remove(&normalize(path)).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

#[async_trait]
impl StorageDriver for MemoryDriver {
    async fn file_exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.files.contains_key(&normalize(path)))
    }

    async fn directory_exists(&self, path: &str) -> Result<bool, StorageError> {
        let dir = normalize(path);
        if dir.is_empty() {
            return Ok(true);
        }
        let prefix = format!("{dir}/");
        Ok(self.files.iter().any(|entry| entry.key().starts_with(&prefix)))
    }

    async fn read(&self, path: &str) -> Result<StoredFile, StorageError> {
        let key = normalize(path);
        self.files
            .get(&key)
            .map(|bytes| StoredFile::new(key.clone(), bytes.value().clone()))
            .ok_or(StorageError::NotFound {
                path: path.to_string(),
            })
    }
}
