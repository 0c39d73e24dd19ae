//! [`StorageDriver`] over a local directory.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{StorageDriver, StorageError, StoredFile};
use crate::config::StorageConfig;

/// Reads files beneath a root directory with `tokio::fs`.
///
/// Paths are interpreted relative to the root. Absolute paths and paths
/// climbing out with `..` are rejected with [`StorageError::OutsideRoot`].
#[derive(Debug, Clone)]
pub struct FilesystemDriver {
    root: PathBuf,
}

impl FilesystemDriver {
    #[must_use]
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.root.clone(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::OutsideRoot {
                        path: path.to_string(),
                    });
                }
            }
        }
        Ok(resolved)
    }

    async fn metadata(&self, path: &str) -> Result<Option<std::fs::Metadata>, StorageError> {
        let resolved = self.resolve(path)?;
        match tokio::fs::metadata(&resolved).await {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }
}

#[async_trait]
impl StorageDriver for FilesystemDriver {
    async fn file_exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.metadata(path).await?.is_some_and(|m| m.is_file()))
    }

    async fn directory_exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.metadata(path).await?.is_some_and(|m| m.is_dir()))
    }

    async fn has(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.metadata(path).await?.is_some())
    }

    async fn read(&self, path: &str) -> Result<StoredFile, StorageError> {
        let resolved = self.resolve(path)?;
        match tokio::fs::read(&resolved).await {
            Ok(bytes) => {
                debug!(path, len = bytes.len(), "file read");
                Ok(StoredFile::new(path, bytes))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound {
                    path: path.to_string(),
                })
            }
            Err(source) => Err(StorageError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> (tempfile::TempDir, FilesystemDriver) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nfts")).unwrap();
        std::fs::write(dir.path().join("nfts/1.json"), br#"{"name":"one"}"#).unwrap();
        let driver = FilesystemDriver::new(&StorageConfig {
            root: dir.path().to_path_buf(),
        });
        (dir, driver)
    }

    #[tokio::test]
    async fn reads_files_under_root() {
        let (_dir, driver) = driver();
        let file = driver.read("nfts/1.json").await.unwrap();
        assert_eq!(file.path, "nfts/1.json");
        let value: serde_json::Value = file.json().unwrap();
        assert_eq!(value["name"], "one");
    }

    #[tokio::test]
    async fn distinguishes_files_and_directories() {
        let (_dir, driver) = driver();
        assert!(driver.file_exists("nfts/1.json").await.unwrap());
        assert!(!driver.file_exists("nfts").await.unwrap());
        assert!(driver.directory_exists("nfts").await.unwrap());
        assert!(!driver.directory_exists("nfts/1.json").await.unwrap());
        assert!(driver.has("nfts").await.unwrap());
        assert!(!driver.has("missing").await.unwrap());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let (_dir, driver) = driver();
        let err = driver.read("nfts/2.json").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn escaping_paths_are_rejected() {
        let (_dir, driver) = driver();
        for path in ["../secret", "/etc/passwd", "nfts/../../x"] {
            let err = driver.read(path).await.unwrap_err();
            assert!(matches!(err, StorageError::OutsideRoot { .. }), "{path}");
        }
    }
}
