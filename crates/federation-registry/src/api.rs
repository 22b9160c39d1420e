//! Shared HTTP envelope: `{success: true, data}` on success and
//! `{success: false, error, details?}` on failure.

use std::fmt;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use subtle::ConstantTimeEq;

/// Failure categories surfaced to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Duplicate,
    NotFound,
    InvalidTransition,
    UnsupportedType,
    SizeLimit,
    Unauthorized,
    Upstream,
}

impl ErrorKind {
    pub const fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Duplicate | ErrorKind::InvalidTransition => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::UnsupportedType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorKind::SizeLimit => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Implemented by every domain error so handlers can render it uniformly.
pub trait Classify: fmt::Display {
    fn kind(&self) -> ErrorKind;

    fn status(&self) -> StatusCode {
        self.kind().status()
    }
}

/// Rendered failure response.
#[derive(Debug, Clone)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub kind: ErrorKind,
    pub error: String,
    pub details: Option<String>,
}

impl ApiFailure {
    pub fn new(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            status: kind.status(),
            kind,
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn from_error<E: Classify + ?Sized>(err: &E) -> Self {
        let kind = err.kind();
        let status = err.status();
        if kind == ErrorKind::Upstream {
            tracing::error!(%status, error = %err, "upstream failure");
            return Self {
                status,
                kind,
                error: "request could not be completed".to_string(),
                details: Some(err.to_string()),
            };
        }

        Self {
            status,
            kind,
            error: err.to_string(),
            details: None,
        }
    }
}

impl<E: Classify> From<E> for ApiFailure {
    fn from(value: E) -> Self {
        ApiFailure::from_error(&value)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "error": self.error,
        });
        if let Some(details) = self.details {
            body["details"] = json!(details);
        }
        (self.status, Json(body)).into_response()
    }
}

/// Rejected request body or query string.
pub fn malformed(detail: impl fmt::Display) -> ApiFailure {
    ApiFailure::new(
        ErrorKind::Validation,
        format!("invalid request body: {detail}"),
    )
}

pub fn success<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(json!({ "success": true, "data": data }))).into_response()
}

pub fn success_with_message<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    (
        status,
        Json(json!({ "success": true, "message": message, "data": data })),
    )
        .into_response()
}

/// Admin gate. An unset token leaves admin routes open.
pub fn authorize_admin(headers: &HeaderMap, expected: Option<&str>) -> Result<(), ApiFailure> {
    let expected = match expected {
        Some(value) if !value.trim().is_empty() => value.trim(),
        _ => return Ok(()),
    };

    if let Some(value) = headers.get("x-admin-token").and_then(|v| v.to_str().ok()) {
        if constant_time_eq(value, expected) {
            return Ok(());
        }
    }
    if let Some(value) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            if constant_time_eq(token, expected) {
                return Ok(());
            }
        }
    }

    Err(ApiFailure::new(
        ErrorKind::Unauthorized,
        "administrator credentials required",
    ))
}

pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
