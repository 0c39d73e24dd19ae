//! Drivers for off-ledger files such as JSON metadata.
//!
//! Handlers reach storage through [`StorageDriver`], used as
//! `Arc<dyn StorageDriver>`:
//!
//! - [`FilesystemDriver`]: files under a root directory via `tokio::fs`
//! - [`MemoryDriver`]: in-memory files, the default for new clients

use std::path::PathBuf;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

pub mod filesystem;
pub mod memory;

pub use filesystem::FilesystemDriver;
pub use memory::MemoryDriver;

/// Failures raised by storage drivers.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no file at [{path}]")]
    NotFound { path: String },

    #[error("path [{path}] resolves outside the storage root")]
    OutsideRoot { path: String },

    #[error("failed to read [{path}]: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("file [{path}] is not valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A file read from a driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: String,
    /// Best-effort content type guessed from the extension.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl StoredFile {
    #[must_use]
    pub fn new(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        let path = path.into();
        let content_type = content_type_for(&path).map(str::to_string);
        Self {
            path,
            content_type,
            bytes,
        }
    }

    /// Parses the file contents as JSON.
    ///
    /// # Errors
    ///
    /// [`StorageError::Json`] if the contents do not parse as `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, StorageError> {
        serde_json::from_slice(&self.bytes).map_err(|source| StorageError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Contents as UTF-8, if valid.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

fn content_type_for(path: &str) -> Option<&'static str> {
    let extension = PathBuf::from(path)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    match extension.as_str() {
        "json" => Some("application/json"),
        "txt" => Some("text/plain"),
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// Read access to off-ledger files addressed by relative path.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// Whether `path` names a regular file.
    async fn file_exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Whether `path` names a directory.
    async fn directory_exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Whether `path` names either a file or a directory.
    async fn has(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.file_exists(path).await? || self.directory_exists(path).await?)
    }

    /// Reads the whole file at `path`.
    ///
    /// # Errors
    ///
    /// [`StorageError::NotFound`] if there is no file at `path`.
    async fn read(&self, path: &str) -> Result<StoredFile, StorageError>;
}
