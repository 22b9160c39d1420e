use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference returned for every stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAssetRef {
    pub original_name: String,
    pub key: String,
    pub content_type: String,
    pub size: u64,
    pub url: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Bytes received for one file part, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Object read back from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: String,
    pub bytes: Vec<u8>,
}
