use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};

use crate::api::{self, ApiFailure};

use super::gateway::{UploadError, UploadGateway, MAX_FILES_PER_REQUEST};
use super::multipart::read_parts;
use super::policy::is_inline;
use super::store::ObjectStore;

const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Request body ceiling for routes that accept a batch of files.
pub fn body_limit(max_file_bytes: usize) -> usize {
    max_file_bytes
        .saturating_mul(MAX_FILES_PER_REQUEST)
        .saturating_add(MULTIPART_OVERHEAD)
}

pub fn upload_router<S>(gateway: Arc<UploadGateway<S>>) -> Router
where
    S: ObjectStore + 'static,
{
    let limit = body_limit(gateway.policy().max_bytes);
    Router::new()
        .route("/uploads/single", post(single_handler::<S>))
        .route("/uploads/multiple", post(multiple_handler::<S>))
        .route("/files/*key", get(file_handler::<S>))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(gateway)
}

pub(crate) async fn single_handler<S>(
    State(gateway): State<Arc<UploadGateway<S>>>,
    mut multipart: Multipart,
) -> Result<Response, ApiFailure>
where
    S: ObjectStore + 'static,
{
    let parts = read_parts(
        &mut multipart,
        gateway.policy().max_bytes,
        MAX_FILES_PER_REQUEST,
    )
    .await?;
    let file = parts
        .into_iter()
        .find(|part| part.name == "file" && part.is_file())
        .ok_or(UploadError::NoFile)?;

    let asset = gateway.upload(file.into_file()).await?;
    Ok(api::success_with_message(
        StatusCode::OK,
        "File uploaded successfully",
        asset,
    ))
}

pub(crate) async fn multiple_handler<S>(
    State(gateway): State<Arc<UploadGateway<S>>>,
    mut multipart: Multipart,
) -> Result<Response, ApiFailure>
where
    S: ObjectStore + 'static,
{
    let parts = read_parts(
        &mut multipart,
        gateway.policy().max_bytes,
        MAX_FILES_PER_REQUEST,
    )
    .await?;
    let files = parts
        .into_iter()
        .filter(|part| part.name == "files" && part.is_file())
        .map(|part| part.into_file())
        .collect();

    let assets = gateway.upload_all(files).await?;
    Ok(api::success_with_message(
        StatusCode::OK,
        "Files uploaded successfully",
        assets,
    ))
}

pub(crate) async fn file_handler<S>(
    State(gateway): State<Arc<UploadGateway<S>>>,
    Path(key): Path<String>,
) -> Result<Response, ApiFailure>
where
    S: ObjectStore + 'static,
{
    let object = gateway.fetch(key.trim_start_matches('/')).await?;
    let disposition = if is_inline(&object.content_type) {
        "inline"
    } else {
        "attachment"
    };
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, object.content_type),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
            (header::CONTENT_DISPOSITION, disposition.to_string()),
        ],
        object.bytes,
    )
        .into_response())
}
