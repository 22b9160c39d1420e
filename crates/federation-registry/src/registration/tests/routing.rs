use super::common::*;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::registration::domain::ApplicantCategory;
use crate::registration::router::{submit_handler, RegistrationState};
use crate::registration::RegistrationService;

fn json_request(method: &str, uri: &str, body: &Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header("x-admin-token", token);
    }
    builder
        .body(Body::from(serde_json::to_vec(body).expect("serialize")))
        .expect("request")
}

fn get_request(uri: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

fn fencer_payload(email: &str) -> Value {
    serde_json::to_value(fencer_submission(email)).expect("serialize submission")
}

async fn register_fencer(router: &axum::Router, email: &str) -> Value {
    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/fencers/register",
            &fencer_payload(email),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json_body(response).await
}

#[tokio::test]
async fn submit_handler_returns_conflict_from_store() {
    let state = RegistrationState {
        service: Arc::new(RegistrationService::new(Arc::new(ConflictRepository))),
        admin_token: None,
    };

    let response = submit_handler(
        State(state),
        ApplicantCategory::Fencer,
        Ok(Json(fencer_submission("asha@example.org"))),
    )
    .await
    .expect_err("conflict");

    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn submit_handler_hides_store_outage_detail_from_error() {
    let state = RegistrationState {
        service: Arc::new(RegistrationService::new(Arc::new(UnavailableRepository))),
        admin_token: None,
    };

    let failure = submit_handler(
        State(state),
        ApplicantCategory::Fencer,
        Ok(Json(fencer_submission("asha@example.org"))),
    )
    .await
    .expect_err("outage");

    assert_eq!(failure.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!failure.error.contains("database offline"));
    assert!(failure
        .details
        .as_deref()
        .is_some_and(|details| details.contains("database offline")));
}

#[tokio::test]
async fn register_route_creates_pending_application() {
    let router = router_with_token(None);
    let payload = register_fencer(&router, "asha@example.org").await;

    assert_eq!(payload["success"], json!(true));
    assert_eq!(payload["message"], json!("Application submitted"));
    assert_eq!(payload["data"]["status"], json!("pending"));
    assert_eq!(payload["data"]["category"], json!("fencer"));
    assert_eq!(payload["data"]["email"], json!("asha@example.org"));
    assert!(payload["data"].get("memberId").is_none());
}

#[tokio::test]
async fn duplicate_registration_is_conflict() {
    let router = router_with_token(None);
    register_fencer(&router, "asha@example.org").await;

    let response = router
        .oneshot(json_request(
            "POST",
            "/fencers/register",
            &fencer_payload("Asha@Example.org"),
            None,
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload["success"], json!(false));
}

#[tokio::test]
async fn missing_document_is_bad_request_naming_the_slot() {
    let router = router_with_token(None);
    let mut payload = fencer_payload("asha@example.org");
    payload["documents"]
        .as_object_mut()
        .expect("documents object")
        .remove("birthCertificate");

    let response = router
        .oneshot(json_request("POST", "/fencers/register", &payload, None))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    let error = body["error"].as_str().expect("error message");
    assert!(error.contains("birthCertificate"), "{error}");
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let router = router_with_token(None);
    let response = router
        .oneshot(
            Request::post("/coaches/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"firstName\": "))
                .expect("request"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_json_body(response).await;
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn status_route_returns_applicant_view() {
    let router = router_with_token(None);
    let created = register_fencer(&router, "asha@example.org").await;
    let id = created["data"]["id"].as_str().expect("id");

    let response = router
        .clone()
        .oneshot(get_request(&format!("/applications/{id}"), None))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let view = read_json_body(response).await;
    assert_eq!(view["data"]["status"], json!("pending"));
    assert_eq!(
        view["data"]["submittedDocuments"]
            .as_array()
            .map(Vec::len),
        Some(4)
    );
    assert!(view["data"].get("email").is_none());

    let missing = router
        .oneshot(get_request("/applications/does-not-exist", None))
        .await
        .expect("route executes");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_require_token_when_configured() {
    let router = router_with_token(Some(ADMIN_TOKEN));
    register_fencer(&router, "asha@example.org").await;

    let anonymous = router
        .clone()
        .oneshot(get_request("/admin/applications", None))
        .await
        .expect("route executes");
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let wrong = router
        .clone()
        .oneshot(get_request("/admin/applications", Some("guess")))
        .await
        .expect("route executes");
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let authorized = router
        .oneshot(get_request(
            "/admin/applications?status=pending&category=fencers",
            Some(ADMIN_TOKEN),
        ))
        .await
        .expect("route executes");
    assert_eq!(authorized.status(), StatusCode::OK);
    let body = read_json_body(authorized).await;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn approve_then_reject_is_conflict() {
    let router = router_with_token(Some(ADMIN_TOKEN));
    let created = register_fencer(&router, "asha@example.org").await;
    let id = created["data"]["id"].as_str().expect("id").to_string();

    let approved = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/admin/applications/{id}/approve"),
            &json!({}),
            Some(ADMIN_TOKEN),
        ))
        .await
        .expect("route executes");
    assert_eq!(approved.status(), StatusCode::OK);
    let body = read_json_body(approved).await;
    assert_eq!(body["data"]["status"], json!("approved"));
    let member_id = body["data"]["memberId"].as_str().expect("member id");
    assert!(member_id.starts_with("DAF-F"));

    let rejected = router
        .oneshot(json_request(
            "POST",
            &format!("/admin/applications/{id}/reject"),
            &json!({ "reason": "too late" }),
            Some(ADMIN_TOKEN),
        ))
        .await
        .expect("route executes");
    assert_eq!(rejected.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn reject_with_blank_reason_is_bad_request() {
    let router = router_with_token(None);
    let created = register_fencer(&router, "asha@example.org").await;
    let id = created["data"]["id"].as_str().expect("id").to_string();

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/admin/applications/{id}/reject"),
            &json!({ "reason": "  " }),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let status = router
        .oneshot(get_request(&format!("/applications/{id}"), None))
        .await
        .expect("route executes");
    let view = read_json_body(status).await;
    assert_eq!(view["data"]["status"], json!("pending"));
}

#[tokio::test]
async fn rejected_application_can_be_resubmitted() {
    let router = router_with_token(None);
    let created = register_fencer(&router, "asha@example.org").await;
    let id = created["data"]["id"].as_str().expect("id").to_string();

    let rejected = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/admin/applications/{id}/reject"),
            &json!({ "reason": "Photo is blurred" }),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(rejected.status(), StatusCode::OK);

    let view = router
        .clone()
        .oneshot(get_request(&format!("/applications/{id}"), None))
        .await
        .expect("route executes");
    let view = read_json_body(view).await;
    assert_eq!(view["data"]["rejectionReason"], json!("Photo is blurred"));

    let resubmitted = router
        .oneshot(json_request(
            "PUT",
            &format!("/applications/{id}/resubmit"),
            &json!({ "documents": { "passportPhoto": "https://files.test/uploads/photo-2.jpg" } }),
            None,
        ))
        .await
        .expect("route executes");
    assert_eq!(resubmitted.status(), StatusCode::OK);
    let body = read_json_body(resubmitted).await;
    assert_eq!(body["data"]["status"], json!("pending"));
    assert_eq!(
        body["data"]["documents"]["passportPhoto"]["url"],
        json!("https://files.test/uploads/photo-2.jpg")
    );
    assert!(body["data"].get("rejectionReason").is_none());
}

#[tokio::test]
async fn unknown_category_filter_is_bad_request() {
    let router = router_with_token(None);
    let response = router
        .oneshot(get_request("/admin/applications?category=archers", None))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn export_route_streams_csv() {
    let router = router_with_token(Some(ADMIN_TOKEN));
    register_fencer(&router, "asha@example.org").await;
    register_fencer(&router, "meera@example.org").await;

    let response = router
        .oneshot(get_request(
            "/admin/exports/applications?status=pending",
            Some(ADMIN_TOKEN),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let text = String::from_utf8(read_body(response).await).expect("utf-8");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("id,category,status"));
    assert!(text.contains("meera@example.org"));
}
