use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};

use serde::Deserialize;

use crate::api::{self, ApiFailure};

use super::broker::PaymentBroker;
use super::domain::OrderContext;
use super::webhook::{SIGNATURE_HEADER, TIMESTAMP_HEADER};

pub fn payment_router(broker: Arc<PaymentBroker>) -> Router {
    Router::new()
        .route("/payments/create-session", post(create_session_handler))
        .route("/payments/verify/:order_id", get(verify_handler))
        .route("/payments/webhook", post(webhook_handler))
        .route("/payments/return", get(return_handler))
        .with_state(broker)
}

pub(crate) async fn create_session_handler(
    State(broker): State<Arc<PaymentBroker>>,
    payload: Result<Json<OrderContext>, JsonRejection>,
) -> Result<Response, ApiFailure> {
    let Json(context) = payload.map_err(|rejection| api::malformed(rejection.body_text()))?;
    let session = broker.create_session(context).await?;
    Ok(api::success_with_message(
        StatusCode::OK,
        "Payment session created",
        session,
    ))
}

pub(crate) async fn verify_handler(
    State(broker): State<Arc<PaymentBroker>>,
    Path(order_id): Path<String>,
) -> Result<Response, ApiFailure> {
    let view = broker.verify(&order_id).await?;
    Ok(api::success(StatusCode::OK, view))
}

#[derive(Debug, Default, Deserialize)]
pub struct ReturnQuery {
    #[serde(default)]
    pub order_id: Option<String>,
}

/// Landing point for the processor redirect; reports the order's current status.
pub(crate) async fn return_handler(
    State(broker): State<Arc<PaymentBroker>>,
    Query(query): Query<ReturnQuery>,
) -> Result<Response, ApiFailure> {
    let order_id = query
        .order_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| api::malformed("order_id query parameter is required"))?;
    let view = broker.verify(&order_id).await?;
    Ok(api::success(StatusCode::OK, view))
}

pub(crate) async fn webhook_handler(
    State(broker): State<Arc<PaymentBroker>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiFailure> {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
    let outcome =
        broker.handle_callback(header(SIGNATURE_HEADER), header(TIMESTAMP_HEADER), &body)?;
    Ok(api::success(StatusCode::OK, outcome))
}
