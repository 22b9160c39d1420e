use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::{self, ApiFailure, ErrorKind};

use super::domain::{
    ApplicantCategory, ApplicationKey, ApplicationStatus, ApplicationSubmission,
    ApplicationUpdate,
};
use super::repository::{ApplicationFilter, ApplicationRepository};
use super::service::{RegistrationService, SubmissionOutcome};

/// Shared state for the registration routes.
pub struct RegistrationState<R> {
    pub service: Arc<RegistrationService<R>>,
    pub admin_token: Option<Arc<str>>,
}

impl<R> Clone for RegistrationState<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            admin_token: self.admin_token.clone(),
        }
    }
}

/// Router builder exposing submission, status, and administrator endpoints.
pub fn registration_router<R>(
    service: Arc<RegistrationService<R>>,
    admin_token: Option<String>,
) -> Router
where
    R: ApplicationRepository + 'static,
{
    let state = RegistrationState {
        service,
        admin_token: admin_token
            .filter(|token| !token.trim().is_empty())
            .map(Arc::from),
    };

    let mut router = Router::new();
    for category in ApplicantCategory::ALL {
        router = router.route(
            &format!("/{}/register", category.plural()),
            post(
                move |state: State<RegistrationState<R>>,
                      payload: Result<Json<ApplicationSubmission>, JsonRejection>| {
                    submit_handler(state, category, payload)
                },
            ),
        );
    }

    router
        .route("/applications/:application_id", get(status_handler::<R>))
        .route(
            "/applications/:application_id/resubmit",
            put(resubmit_handler::<R>),
        )
        .route("/admin/applications", get(list_handler::<R>))
        .route(
            "/admin/applications/:application_id/approve",
            post(approve_handler::<R>),
        )
        .route(
            "/admin/applications/:application_id/reject",
            post(reject_handler::<R>),
        )
        .route("/admin/exports/applications", get(export_handler::<R>))
        .with_state(state)
}

pub(crate) async fn submit_handler<R>(
    State(state): State<RegistrationState<R>>,
    category: ApplicantCategory,
    payload: Result<Json<ApplicationSubmission>, JsonRejection>,
) -> Result<Response, ApiFailure>
where
    R: ApplicationRepository + 'static,
{
    let Json(submission) = payload.map_err(|rejection| api::malformed(rejection.body_text()))?;
    let outcome = state
        .service
        .blocking(move |service| service.submit(category, submission))
        .await?;
    Ok(submission_response(outcome))
}

pub(crate) fn submission_response(outcome: SubmissionOutcome) -> Response {
    let message = match &outcome {
        SubmissionOutcome::Created(_) => "Application submitted",
        SubmissionOutcome::Resubmitted(_) => "Rejected application resubmitted",
    };
    api::success_with_message(StatusCode::CREATED, message, outcome.into_record())
}

pub(crate) async fn status_handler<R>(
    State(state): State<RegistrationState<R>>,
    Path(application_id): Path<String>,
) -> Result<Response, ApiFailure>
where
    R: ApplicationRepository + 'static,
{
    let key = ApplicationKey(application_id);
    let record = state
        .service
        .blocking(move |service| service.get(&key))
        .await?;
    Ok(api::success(StatusCode::OK, record.status_view()))
}

pub(crate) async fn resubmit_handler<R>(
    State(state): State<RegistrationState<R>>,
    Path(application_id): Path<String>,
    payload: Result<Json<ApplicationUpdate>, JsonRejection>,
) -> Result<Response, ApiFailure>
where
    R: ApplicationRepository + 'static,
{
    let Json(update) = payload.map_err(|rejection| api::malformed(rejection.body_text()))?;
    let key = ApplicationKey(application_id);
    let record = state
        .service
        .blocking(move |service| service.resubmit(&key, update))
        .await?;
    Ok(api::success_with_message(
        StatusCode::OK,
        "Application resubmitted",
        record,
    ))
}

/// Query accepted by the admin listing and export. Categories may be singular or plural.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl ListQuery {
    fn category(&self) -> Result<Option<ApplicantCategory>, ApiFailure> {
        self.category
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .map(|value| {
                value
                    .parse::<ApplicantCategory>()
                    .map_err(|err| ApiFailure::new(ErrorKind::Validation, err.to_string()))
            })
            .transpose()
    }
}

pub(crate) async fn list_handler<R>(
    State(state): State<RegistrationState<R>>,
    headers: HeaderMap,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response, ApiFailure>
where
    R: ApplicationRepository + 'static,
{
    api::authorize_admin(&headers, state.admin_token.as_deref())?;
    let Query(query) = query.map_err(|rejection| api::malformed(rejection.body_text()))?;
    let filter = ApplicationFilter::listing(query.status, query.category()?, query.limit);
    let records = state
        .service
        .blocking(move |service| service.list(&filter))
        .await?;
    Ok(api::success(StatusCode::OK, records))
}

pub(crate) async fn approve_handler<R>(
    State(state): State<RegistrationState<R>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Result<Response, ApiFailure>
where
    R: ApplicationRepository + 'static,
{
    api::authorize_admin(&headers, state.admin_token.as_deref())?;
    let key = ApplicationKey(application_id);
    let record = state
        .service
        .blocking(move |service| service.approve(&key))
        .await?;
    Ok(api::success_with_message(
        StatusCode::OK,
        "Application approved",
        record,
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

pub(crate) async fn reject_handler<R>(
    State(state): State<RegistrationState<R>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    payload: Result<Json<RejectRequest>, JsonRejection>,
) -> Result<Response, ApiFailure>
where
    R: ApplicationRepository + 'static,
{
    api::authorize_admin(&headers, state.admin_token.as_deref())?;
    let Json(request) = payload.map_err(|rejection| api::malformed(rejection.body_text()))?;
    let key = ApplicationKey(application_id);
    let record = state
        .service
        .blocking(move |service| service.reject(&key, request.reason))
        .await?;
    Ok(api::success_with_message(
        StatusCode::OK,
        "Application rejected",
        record,
    ))
}

pub(crate) async fn export_handler<R>(
    State(state): State<RegistrationState<R>>,
    headers: HeaderMap,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response, ApiFailure>
where
    R: ApplicationRepository + 'static,
{
    api::authorize_admin(&headers, state.admin_token.as_deref())?;
    let Query(query) = query.map_err(|rejection| api::malformed(rejection.body_text()))?;
    let filter = ApplicationFilter {
        status: query.status,
        category: query.category()?,
        limit: query.limit,
    };
    let csv = state
        .service
        .blocking(move |service| service.export_csv(&filter))
        .await?;

    let mut response = (StatusCode::OK, csv).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("attachment; filename=\"applications.csv\""),
    );
    Ok(response)
}
