//! Single-request registration: application JSON and document files in one multipart body.
//!
//! The checklist runs over JSON-supplied references plus the attached file fields, and an
//! active record for the same identity is refused, before any file is stored. Then every file
//! goes through the upload gateway and the assembled submission through the registration
//! service.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::Response,
    routing::post,
    Router,
};
use chrono::Utc;

use crate::api::{ApiFailure, Classify, ErrorKind};
use crate::registration::checklist::{self, ValidationError};
use crate::registration::domain::{
    ApplicantCategory, ApplicationRecord, ApplicationSubmission, DocumentInput, DocumentRef,
    UnknownCategory,
};
use crate::registration::repository::ApplicationRepository;
use crate::registration::router::submission_response;
use crate::registration::service::{RegistrationError, RegistrationService, SubmissionOutcome};
use crate::uploads::multipart::{read_parts, Part};
use crate::uploads::router::body_limit;
use crate::uploads::{ObjectStore, UploadError, UploadGateway, MAX_FILES_PER_REQUEST};

pub const CATEGORY_FIELD: &str = "category";
pub const APPLICATION_FIELD: &str = "application";

const PLACEHOLDER_URL: &str = "pending-upload";

#[derive(Debug, thiserror::Error)]
pub enum IngressError {
    #[error("missing multipart field '{0}'")]
    MissingField(&'static str),
    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategory),
    #[error("invalid application JSON: {0}")]
    MalformedApplication(String),
    #[error("file field '{0}' was sent more than once")]
    DuplicateSlot(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

impl Classify for IngressError {
    fn kind(&self) -> ErrorKind {
        match self {
            IngressError::MissingField(_)
            | IngressError::UnknownCategory(_)
            | IngressError::MalformedApplication(_)
            | IngressError::DuplicateSlot(_)
            | IngressError::Validation(_) => ErrorKind::Validation,
            IngressError::Upload(err) => err.kind(),
            IngressError::Registration(err) => err.kind(),
        }
    }
}

/// Category, submission, and the file parts keyed by slot, as read from the request.
#[derive(Debug)]
pub(crate) struct IngressRequest {
    pub category: ApplicantCategory,
    pub submission: ApplicationSubmission,
    pub files: Vec<(String, Part)>,
}

pub(crate) fn parse_parts(parts: Vec<Part>) -> Result<IngressRequest, IngressError> {
    let mut category = None;
    let mut application = None;
    let mut files = Vec::new();
    let mut seen = BTreeSet::new();

    for part in parts {
        if part.is_file() {
            let slot = part.name.trim().to_string();
            if !seen.insert(slot.clone()) {
                return Err(IngressError::DuplicateSlot(slot));
            }
            files.push((slot, part));
            continue;
        }

        match part.name.as_str() {
            CATEGORY_FIELD => {
                category = Some(part.text()?.parse::<ApplicantCategory>()?);
            }
            APPLICATION_FIELD => {
                let submission: ApplicationSubmission = serde_json::from_slice(&part.bytes)
                    .map_err(|err| IngressError::MalformedApplication(err.to_string()))?;
                application = Some(submission);
            }
            other => tracing::debug!(field = other, "ignoring unrecognised multipart field"),
        }
    }

    Ok(IngressRequest {
        category: category.ok_or(IngressError::MissingField(CATEGORY_FIELD))?,
        submission: application.ok_or(IngressError::MissingField(APPLICATION_FIELD))?,
        files,
    })
}

/// Runs the field and document checks as if every attached file were already stored.
pub(crate) fn precheck(request: &IngressRequest) -> Result<(), ValidationError> {
    let mut candidate = ApplicationRecord::from_submission(
        request.category,
        request.submission.clone(),
        Utc::now(),
    );
    for (slot, _) in &request.files {
        candidate
            .documents
            .insert(slot.clone(), DocumentRef::from_url(PLACEHOLDER_URL));
    }
    checklist::check_record(&candidate)
}

/// Checklist and identity first, then uploads, then the submission. Files stored for a
/// submission that still fails are discarded.
pub(crate) async fn register_with_documents<R, S>(
    registration: &Arc<RegistrationService<R>>,
    gateway: &UploadGateway<S>,
    request: IngressRequest,
) -> Result<SubmissionOutcome, IngressError>
where
    R: ApplicationRepository + 'static,
    S: ObjectStore + 'static,
{
    precheck(&request)?;

    let IngressRequest {
        category,
        mut submission,
        files,
    } = request;

    let email = submission.applicant.email.clone();
    registration
        .blocking(move |service| service.ensure_identity_free(&email, category))
        .await?;

    let accepted = files
        .into_iter()
        .map(|(slot, part)| gateway.check(part.into_file()).map(|file| (slot, file)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut stored_keys = Vec::with_capacity(accepted.len());
    for (slot, file) in accepted {
        let asset = match gateway.store(file).await {
            Ok(asset) => asset,
            Err(err) => {
                gateway.discard(stored_keys.iter().map(String::as_str)).await;
                return Err(err.into());
            }
        };
        stored_keys.push(asset.key.clone());
        submission
            .documents
            .insert(slot, DocumentInput::Reference(DocumentRef::from(asset)));
    }

    match registration
        .blocking(move |service| service.submit(category, submission))
        .await
    {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            gateway.discard(stored_keys.iter().map(String::as_str)).await;
            Err(err.into())
        }
    }
}

pub struct IngressState<R, S> {
    pub registration: Arc<RegistrationService<R>>,
    pub gateway: Arc<UploadGateway<S>>,
}

impl<R, S> Clone for IngressState<R, S> {
    fn clone(&self) -> Self {
        Self {
            registration: Arc::clone(&self.registration),
            gateway: Arc::clone(&self.gateway),
        }
    }
}

pub fn ingress_router<R, S>(
    registration: Arc<RegistrationService<R>>,
    gateway: Arc<UploadGateway<S>>,
) -> Router
where
    R: ApplicationRepository + 'static,
    S: ObjectStore + 'static,
{
    let limit = body_limit(gateway.policy().max_bytes);
    Router::new()
        .route("/functions/register", post(register_handler::<R, S>))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(IngressState {
            registration,
            gateway,
        })
}

pub(crate) async fn register_handler<R, S>(
    State(state): State<IngressState<R, S>>,
    mut multipart: Multipart,
) -> Result<Response, ApiFailure>
where
    R: ApplicationRepository + 'static,
    S: ObjectStore + 'static,
{
    let parts = read_parts(
        &mut multipart,
        state.gateway.policy().max_bytes,
        MAX_FILES_PER_REQUEST + 2,
    )
    .await
    .map_err(IngressError::from)?;
    let request = parse_parts(parts)?;
    let outcome = register_with_documents(&state.registration, &state.gateway, request).await?;
    tracing::info!(
        application_id = %outcome.record().id,
        "application registered through multipart ingress"
    );
    Ok(submission_response(outcome))
}
