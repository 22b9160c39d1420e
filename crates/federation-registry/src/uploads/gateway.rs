use std::sync::Arc;

use chrono::Utc;

use crate::api::{Classify, ErrorKind};

use super::asset::{IncomingFile, StoredAssetRef, StoredObject};
use super::policy::{self, UploadPolicy};
use super::store::{ObjectStore, ObjectStoreError};

pub const MAX_FILES_PER_REQUEST: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("no file was provided")]
    NoFile,
    #[error("file '{file_name}' is empty")]
    Empty { file_name: String },
    #[error("file type '{content_type}' is not allowed")]
    UnsupportedType { content_type: String },
    #[error("file exceeds the {limit} byte upload limit")]
    TooLarge { limit: usize },
    #[error("at most {limit} files may be uploaded at once")]
    TooManyFiles { limit: usize },
    #[error("invalid multipart body: {0}")]
    Multipart(String),
    #[error("file '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] ObjectStoreError),
}

impl Classify for UploadError {
    fn kind(&self) -> ErrorKind {
        match self {
            UploadError::NoFile
            | UploadError::Empty { .. }
            | UploadError::TooManyFiles { .. }
            | UploadError::Multipart(_) => ErrorKind::Validation,
            UploadError::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            UploadError::TooLarge { .. } => ErrorKind::SizeLimit,
            UploadError::NotFound(_) => ErrorKind::NotFound,
            UploadError::Store(_) => ErrorKind::Upstream,
        }
    }
}

/// A file that passed the upload policy and may be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedFile {
    pub original_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Validates uploads against the policy and writes them to the object store.
pub struct UploadGateway<S> {
    store: Arc<S>,
    policy: UploadPolicy,
    public_base_url: String,
}

impl<S> UploadGateway<S>
where
    S: ObjectStore + 'static,
{
    pub fn new(store: Arc<S>, policy: UploadPolicy, public_base_url: impl Into<String>) -> Self {
        Self {
            store,
            policy,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn policy(&self) -> UploadPolicy {
        self.policy
    }

    /// Applies size and type checks without touching the store.
    pub fn check(&self, file: IncomingFile) -> Result<AcceptedFile, UploadError> {
        let original_name = file.file_name.trim().to_string();
        if file.bytes.is_empty() {
            return Err(UploadError::Empty {
                file_name: original_name,
            });
        }
        if !self.policy.within_limit(file.bytes.len()) {
            return Err(UploadError::TooLarge {
                limit: self.policy.max_bytes,
            });
        }

        let content_type =
            policy::resolve_content_type(file.content_type.as_deref(), &original_name);
        if !policy::is_allowed(&content_type) {
            return Err(UploadError::UnsupportedType { content_type });
        }

        Ok(AcceptedFile {
            original_name,
            content_type,
            bytes: file.bytes,
        })
    }

    /// Stores an accepted file under a fresh key. Every call creates a new object.
    pub async fn store(&self, file: AcceptedFile) -> Result<StoredAssetRef, UploadError> {
        let now = Utc::now();
        let key = policy::object_key(now, &policy::sanitize_file_name(&file.original_name));
        let size = file.bytes.len() as u64;

        self.store.put(&key, file.bytes, &file.content_type).await?;
        tracing::info!(%key, size, content_type = %file.content_type, "upload stored");

        Ok(StoredAssetRef {
            url: self.public_url(&key),
            original_name: file.original_name,
            key,
            content_type: file.content_type,
            size,
            uploaded_at: now,
        })
    }

    pub async fn upload(&self, file: IncomingFile) -> Result<StoredAssetRef, UploadError> {
        let accepted = self.check(file)?;
        self.store(accepted).await
    }

    /// Checks the whole batch before storing any of it.
    pub async fn upload_all(
        &self,
        files: Vec<IncomingFile>,
    ) -> Result<Vec<StoredAssetRef>, UploadError> {
        if files.is_empty() {
            return Err(UploadError::NoFile);
        }
        if files.len() > MAX_FILES_PER_REQUEST {
            return Err(UploadError::TooManyFiles {
                limit: MAX_FILES_PER_REQUEST,
            });
        }

        let accepted = files
            .into_iter()
            .map(|file| self.check(file))
            .collect::<Result<Vec<_>, _>>()?;

        let mut stored: Vec<StoredAssetRef> = Vec::with_capacity(accepted.len());
        for file in accepted {
            match self.store(file).await {
                Ok(asset) => stored.push(asset),
                Err(err) => {
                    let keys: Vec<&str> = stored.iter().map(|asset| asset.key.as_str()).collect();
                    self.discard(keys).await;
                    return Err(err);
                }
            }
        }
        Ok(stored)
    }

    /// Best-effort removal of objects no record will reference.
    pub async fn discard<'a>(&self, keys: impl IntoIterator<Item = &'a str>) {
        for key in keys {
            match self.store.delete(key).await {
                Ok(()) => tracing::info!(%key, "discarded unreferenced upload"),
                Err(err) => tracing::warn!(%key, error = %err, "could not discard upload"),
            }
        }
    }

    pub async fn fetch(&self, key: &str) -> Result<StoredObject, UploadError> {
        match self.store.get(key).await {
            Ok(Some(object)) => Ok(object),
            Ok(None) | Err(ObjectStoreError::InvalidKey(_)) => {
                Err(UploadError::NotFound(key.to_string()))
            }
            Err(other) => Err(other.into()),
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/files/{key}", self.public_base_url)
    }
}
