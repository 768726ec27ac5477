use async_trait::async_trait;
use convo_core::{ConvoError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Byte-level durability for one transcript per key.
///
/// Implementations map a conversation key to `<key>.json` in their medium.
/// `read` must return [`ConvoError::NotFound`] for an absent key and
/// [`ConvoError::StorageError`] for every other fault.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend label used in logs and errors.
    fn name(&self) -> &'static str;

    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Full overwrite of the stored document.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool> {
        match self.read(key).await {
            Ok(_) => Ok(true),
            Err(ConvoError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

pub(crate) fn document_name(key: &str) -> String {
    format!("{}.json", key)
}

/// One JSON file per conversation under a root directory.
#[derive(Debug, Clone)]
pub struct LocalFileBackend {
    root: PathBuf,
}

impl LocalFileBackend {
    /// Create the backend, creating `root` if it does not exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            ConvoError::ConfigError(format!(
                "Cannot create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        debug!("LocalFileBackend initialized: root={:?}", root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(document_name(key))
    }
}

#[async_trait]
impl StorageBackend for LocalFileBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("Read {} bytes from {:?}", bytes.len(), path);
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ConvoError::NotFound(document_name(key)))
            }
            Err(e) => Err(ConvoError::storage(
                self.name(),
                format!("failed to read {}: {}", path.display(), e),
            )),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ConvoError::storage(
                    self.name(),
                    format!("failed to create {}: {}", parent.display(), e),
                )
            })?;
        }

        tokio::fs::write(&path, bytes).await.map_err(|e| {
            ConvoError::storage(
                self.name(),
                format!("failed to write {}: {}", path.display(), e),
            )
        })?;

        debug!("Wrote {} bytes to {:?}", bytes.len(), path);
        Ok(())
    }
}
