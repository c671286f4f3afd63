//! Blob storage for uploads, transcripts, and rendered exports.
//!
//! Blobs are immutable: an update is a new `put` plus a pointer swap in the
//! job record, never an in-place rewrite.

use std::path::PathBuf;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("invalid blob reference: {0}")]
    InvalidRef(String),
    #[error("storage io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Opaque handle to a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobRef(String);

impl BlobRef {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Filesystem-backed blob store rooted at a single directory.
///
/// Writes go to a temporary sibling and are renamed into place, so a reader
/// never observes a partially written blob.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StorageError::Io {
            path: root.clone(),
            source: e,
        })?;
        info!("Blob store at {:?}", root);
        Ok(Self { root })
    }

    pub async fn put(&self, bytes: &[u8]) -> Result<BlobRef, StorageError> {
        let blob = BlobRef::generate();
        let path = self.path_for(&blob)?;
        let tmp = path.with_extension("tmp");

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StorageError::Io {
                path: tmp.clone(),
                source: e,
            })?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StorageError::Io {
                path: path.clone(),
                source: e,
            })?;

        Ok(blob)
    }

    pub async fn get(&self, blob: &BlobRef) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(blob)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(blob.as_str().to_string()))
            }
            Err(e) => Err(StorageError::Io { path, source: e }),
        }
    }

    pub async fn exists(&self, blob: &BlobRef) -> bool {
        match self.path_for(blob) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    pub async fn delete(&self, blob: &BlobRef) -> Result<(), StorageError> {
        let path = self.path_for(blob)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(blob.as_str().to_string()))
            }
            Err(e) => Err(StorageError::Io { path, source: e }),
        }
    }

    /// Refs are generated uuids; anything else is rejected before it can
    /// reach the filesystem.
    fn path_for(&self, blob: &BlobRef) -> Result<PathBuf, StorageError> {
        let id = blob.as_str();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StorageError::InvalidRef(id.to_string()));
        }
        Ok(self.root.join(format!("{id}.bin")))
    }
}
