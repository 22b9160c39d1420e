use chrono::{DateTime, Datelike, Utc};
use rand::Rng;

use crate::config::DEFAULT_UPLOAD_MAX_BYTES;

const OFFICE_TYPES: [&str; 7] = [
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.oasis.opendocument.text",
    "application/vnd.oasis.opendocument.spreadsheet",
];

const GENERIC_BINARY: &str = "application/octet-stream";

/// Image types that can carry script.
const SCRIPTABLE_IMAGES: [&str; 1] = ["image/svg+xml"];

/// Types a browser may render in place; everything else is served as an attachment.
const INLINE_TYPES: [&str; 6] = [
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/webp",
    "image/bmp",
    "application/pdf",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_UPLOAD_MAX_BYTES,
        }
    }
}

impl UploadPolicy {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    pub fn within_limit(&self, size: usize) -> bool {
        size <= self.max_bytes
    }
}

/// `image/*` except SVG, PDF, Word, Excel, OpenDocument text/spreadsheet, and CSV.
pub fn is_allowed(content_type: &str) -> bool {
    let essence = essence(content_type);
    let image = essence.starts_with("image/") && !SCRIPTABLE_IMAGES.contains(&essence.as_str());
    image || essence == "text/csv" || OFFICE_TYPES.contains(&essence.as_str())
}

pub fn is_inline(content_type: &str) -> bool {
    INLINE_TYPES.contains(&essence(content_type).as_str())
}

/// Declared content type, or a guess from the file name when none (or a generic binary
/// type) was declared.
pub fn resolve_content_type(declared: Option<&str>, file_name: &str) -> String {
    match declared.map(essence) {
        Some(declared) if !declared.is_empty() && declared != GENERIC_BINARY => declared,
        _ => mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Keeps the final path component with unsafe characters replaced.
pub fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Lower-cased extension of a sanitised name, including the dot.
pub fn extension(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    let valid = !stem.is_empty()
        && !ext.is_empty()
        && ext.len() <= 10
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| format!(".{}", ext.to_ascii_lowercase()))
}

/// `uploads/YYYY/MM/DD/{unix_millis}-{8 hex}{.ext}`.
pub fn object_key(now: DateTime<Utc>, file_name: &str) -> String {
    let nonce: u32 = rand::thread_rng().gen();
    format!(
        "uploads/{:04}/{:02}/{:02}/{}-{nonce:08x}{}",
        now.year(),
        now.month(),
        now.day(),
        now.timestamp_millis(),
        extension(file_name).unwrap_or_default(),
    )
}
