use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;

use super::asset::IncomingFile;
use super::gateway::UploadError;

/// One buffered multipart part.
#[derive(Debug, Clone)]
pub(crate) struct Part {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Part {
    pub fn is_file(&self) -> bool {
        self.file_name.is_some()
    }

    pub fn into_file(self) -> IncomingFile {
        IncomingFile {
            file_name: self.file_name.unwrap_or_else(|| self.name.clone()),
            content_type: self.content_type,
            bytes: self.bytes,
        }
    }

    pub fn text(&self) -> Result<&str, UploadError> {
        std::str::from_utf8(&self.bytes)
            .map_err(|_| UploadError::Multipart(format!("field '{}' is not valid UTF-8", self.name)))
    }
}

fn multipart_error(err: MultipartError, limit: usize) -> UploadError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge { limit }
    } else {
        UploadError::Multipart(err.body_text())
    }
}

/// Reads a field chunk by chunk, stopping as soon as `limit` is crossed.
async fn read_capped(mut field: Field<'_>, limit: usize) -> Result<Vec<u8>, UploadError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|err| multipart_error(err, limit))?
    {
        if bytes.len() + chunk.len() > limit {
            return Err(UploadError::TooLarge { limit });
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// Buffers every part, each capped at `limit` bytes. At most `max_parts` parts are read.
pub(crate) async fn read_parts(
    multipart: &mut Multipart,
    limit: usize,
    max_parts: usize,
) -> Result<Vec<Part>, UploadError> {
    let mut parts = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(err, limit))?
    {
        if parts.len() == max_parts {
            return Err(UploadError::TooManyFiles { limit: max_parts });
        }

        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = read_capped(field, limit).await?;
        parts.push(Part {
            name,
            file_name,
            content_type,
            bytes,
        });
    }
    Ok(parts)
}
