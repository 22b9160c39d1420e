use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use federation_registry::accounts::{accounts_router, AccountService, UserRepository};
use federation_registry::ingress::ingress_router;
use federation_registry::payments::{payment_router, PaymentBroker};
use federation_registry::registration::{
    registration_router, ApplicationRepository, RegistrationService,
};
use federation_registry::uploads::{upload_router, ObjectStore, UploadGateway};
use serde_json::json;
use std::sync::Arc;

/// Everything the HTTP surface is built from.
pub(crate) struct Services<R, U, S> {
    pub(crate) registration: Arc<RegistrationService<R>>,
    pub(crate) accounts: Arc<AccountService<U>>,
    pub(crate) gateway: Arc<UploadGateway<S>>,
    pub(crate) broker: Arc<PaymentBroker>,
    pub(crate) admin_token: Option<String>,
}

pub(crate) fn build_router<R, U, S>(services: Services<R, U, S>) -> Router
where
    R: ApplicationRepository + 'static,
    U: UserRepository + 'static,
    S: ObjectStore + 'static,
{
    let Services {
        registration,
        accounts,
        gateway,
        broker,
        admin_token,
    } = services;

    registration_router(registration.clone(), admin_token)
        .merge(accounts_router(accounts))
        .merge(upload_router(gateway.clone()))
        .merge(ingress_router(registration, gateway))
        .merge(payment_router(broker))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
