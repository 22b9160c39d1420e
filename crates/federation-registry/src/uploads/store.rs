use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use super::asset::StoredObject;

#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("invalid object key '{0}'")]
    InvalidKey(String),
    #[error("object store i/o failure for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

/// Blob storage for uploaded documents.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError>;

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, ObjectStoreError>;

    /// Removes an object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
}

/// Relative, normal path components only.
pub(crate) fn validate_key(key: &str) -> Result<&Path, ObjectStoreError> {
    let path = Path::new(key);
    let normal = !key.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if normal {
        Ok(path)
    } else {
        Err(ObjectStoreError::InvalidKey(key.to_string()))
    }
}

/// Stores objects as plain files beneath `root`, keyed by their relative path. Content types
/// are recovered from the key's extension.
#[derive(Debug, Clone)]
pub struct FilesystemObjectStore {
    root: PathBuf,
}

impl FilesystemObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        let path = self.root.join(validate_key(key)?);
        let io_error = |source| ObjectStoreError::Io {
            key: key.to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(&path, bytes).await.map_err(io_error)
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, ObjectStoreError> {
        let path = self.root.join(validate_key(key)?);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(StoredObject {
                content_type: mime_guess::from_path(&path)
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string(),
                bytes,
            })),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ObjectStoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.root.join(validate_key(key)?);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ObjectStoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), ObjectStoreError> {
        validate_key(key)?;
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| ObjectStoreError::Unavailable("object map poisoned".into()))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, ObjectStoreError> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| ObjectStoreError::Unavailable("object map poisoned".into()))?;
        Ok(objects.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.objects
            .lock()
            .map_err(|_| ObjectStoreError::Unavailable("object map poisoned".into()))?
            .remove(key);
        Ok(())
    }
}
