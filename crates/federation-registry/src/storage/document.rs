use std::fs;
use std::io;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

const EXTENSION: &str = "json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("i/o failure at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed document at {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid document id '{0}'")]
    InvalidId(String),
}

/// Directory of JSON documents, one file per id. Writes go to a temporary file first and are
/// renamed into place, so readers never observe a partial document.
#[derive(Debug)]
pub struct DocumentCollection<T> {
    dir: PathBuf,
    _document: PhantomData<fn() -> T>,
}

impl<T> DocumentCollection<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            _document: PhantomData,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn get(&self, id: &str) -> Result<Option<T>, StorageError> {
        let path = self.path_for(id)?;
        match fs::read(&path) {
            Ok(bytes) => decode(&path, &bytes).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    pub fn put(&self, id: &str, document: &T) -> Result<(), StorageError> {
        let path = self.path_for(id)?;
        let bytes =
            serde_json::to_vec_pretty(document).map_err(|source| StorageError::Malformed {
                path: path.clone(),
                source,
            })?;

        let staging = self
            .dir
            .join(format!(".{id}.{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&staging, bytes).map_err(|source| StorageError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| {
            let _ = fs::remove_file(&staging);
            StorageError::Io { path, source }
        })
    }

    /// Every readable document, in no particular order. Documents that fail to decode are
    /// skipped with a warning; `get` still reports them.
    pub fn scan(&self) -> Result<Vec<T>, StorageError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut documents = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StorageError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            let is_document = path.extension().and_then(|ext| ext.to_str()) == Some(EXTENSION)
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_document {
                continue;
            }

            let bytes = fs::read(&path).map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
            match decode(&path, &bytes) {
                Ok(document) => documents.push(document),
                Err(err) => tracing::warn!(error = %err, "skipping unreadable document"),
            }
        }
        Ok(documents)
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StorageError> {
        let valid = !id.is_empty()
            && id.len() <= 128
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{id}.{EXTENSION}")))
    }
}

fn decode<T: DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(bytes).map_err(|source| StorageError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}
