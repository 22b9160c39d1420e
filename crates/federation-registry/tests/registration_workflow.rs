//! End-to-end registration scenarios over the JSON document store, driven through the public
//! HTTP router the way an applicant and an administrator would.

mod common {
    use axum::body::Body;
    use axum::http::{header, Request};
    use axum::response::Response;
    use serde_json::{json, Value};

    pub(super) const ADMIN_TOKEN: &str = "admin-secret";

    pub(super) fn fencer_payload(email: &str, slots: &[&str]) -> Value {
        let documents: serde_json::Map<String, Value> = slots
            .iter()
            .map(|slot| {
                (
                    (*slot).to_string(),
                    json!(format!("https://files.test/uploads/{slot}.pdf")),
                )
            })
            .collect();
        json!({
            "userId": "user-asha",
            "firstName": "Asha",
            "lastName": "Rao",
            "email": email,
            "phone": "9876543210",
            "dateOfBirth": "2008-05-14",
            "residentialAddress": "12 Lake Road, Pune",
            "district": "Pune",
            "weapon": "sabre",
            "documents": documents,
        })
    }

    pub(super) fn post_json(uri: &str, body: &Value, admin: bool) -> Request<Body> {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if admin {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"));
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    pub(super) async fn read_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 256 * 1024)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    pub(super) fn is_fencer_member_id(value: &str) -> bool {
        value
            .strip_prefix("DAF-F")
            .is_some_and(|digits| digits.len() == 8 && digits.chars().all(|c| c.is_ascii_digit()))
    }
}

use std::sync::Arc;

use axum::http::StatusCode;
use federation_registry::registration::{
    registration_router, ApplicationFilter, ApplicationKey, ApplicationRepository,
    ApplicationStatus, RegistrationService,
};
use federation_registry::storage::JsonApplicationRepository;
use serde_json::json;
use tower::ServiceExt;

use common::*;

const FENCER_SLOTS: [&str; 4] = [
    "passportPhoto",
    "aadharFront",
    "aadharBack",
    "birthCertificate",
];

fn router_over(repository: Arc<JsonApplicationRepository>) -> axum::Router {
    registration_router(
        Arc::new(RegistrationService::new(repository)),
        Some(ADMIN_TOKEN.to_string()),
    )
}

#[tokio::test]
async fn fencer_application_lifecycle() {
    let data_dir = tempfile::tempdir().expect("tempdir");
    let repository =
        Arc::new(JsonApplicationRepository::open(data_dir.path()).expect("open store"));
    let router = router_over(repository.clone());

    let incomplete = router
        .clone()
        .oneshot(post_json(
            "/fencers/register",
            &fencer_payload("asha@example.org", &FENCER_SLOTS[..3]),
            false,
        ))
        .await
        .expect("route executes");
    assert_eq!(incomplete.status(), StatusCode::BAD_REQUEST);
    let body = read_json(incomplete).await;
    assert!(body["error"]
        .as_str()
        .is_some_and(|error| error.contains("birthCertificate")));

    let created = router
        .clone()
        .oneshot(post_json(
            "/fencers/register",
            &fencer_payload("asha@example.org", &FENCER_SLOTS),
            false,
        ))
        .await
        .expect("route executes");
    assert_eq!(created.status(), StatusCode::CREATED);
    let body = read_json(created).await;
    assert_eq!(body["data"]["status"], json!("pending"));
    let id = body["data"]["id"].as_str().expect("id").to_string();

    let duplicate = router
        .clone()
        .oneshot(post_json(
            "/fencers/register",
            &fencer_payload("asha@example.org", &FENCER_SLOTS),
            false,
        ))
        .await
        .expect("route executes");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let unauthorized = router
        .clone()
        .oneshot(post_json(
            &format!("/admin/applications/{id}/approve"),
            &json!({}),
            false,
        ))
        .await
        .expect("route executes");
    assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

    let approved = router
        .clone()
        .oneshot(post_json(
            &format!("/admin/applications/{id}/approve"),
            &json!({}),
            true,
        ))
        .await
        .expect("route executes");
    assert_eq!(approved.status(), StatusCode::OK);
    let body = read_json(approved).await;
    assert_eq!(body["data"]["status"], json!("approved"));
    let member_id = body["data"]["memberId"].as_str().expect("member id");
    assert!(is_fencer_member_id(member_id), "{member_id}");

    let stored = repository
        .fetch(&ApplicationKey(id))
        .expect("fetch")
        .expect("present");
    assert_eq!(stored.status, ApplicationStatus::Approved);
    assert_eq!(stored.revision, 2);
}

#[tokio::test]
async fn rejection_keeps_reason_and_issues_no_member_id() {
    let data_dir = tempfile::tempdir().expect("tempdir");
    let repository =
        Arc::new(JsonApplicationRepository::open(data_dir.path()).expect("open store"));
    let router = router_over(repository);

    let created = router
        .clone()
        .oneshot(post_json(
            "/fencers/register",
            &fencer_payload("meera@example.org", &FENCER_SLOTS),
            false,
        ))
        .await
        .expect("route executes");
    let id = read_json(created).await["data"]["id"]
        .as_str()
        .expect("id")
        .to_string();

    let rejected = router
        .oneshot(post_json(
            &format!("/admin/applications/{id}/reject"),
            &json!({ "reason": "Aadhar illegible" }),
            true,
        ))
        .await
        .expect("route executes");
    assert_eq!(rejected.status(), StatusCode::OK);
    let body = read_json(rejected).await;
    assert_eq!(body["data"]["status"], json!("rejected"));
    assert_eq!(body["data"]["rejectionReason"], json!("Aadhar illegible"));
    assert!(body["data"].get("memberId").is_none());
}

#[test]
fn json_store_survives_reopening() {
    let data_dir = tempfile::tempdir().expect("tempdir");
    let key = {
        let repository =
            Arc::new(JsonApplicationRepository::open(data_dir.path()).expect("open store"));
        let service = RegistrationService::new(repository);
        let record = service
            .submit(
                "fencer".parse().expect("category"),
                serde_json::from_value(fencer_payload("asha@example.org", &FENCER_SLOTS))
                    .expect("submission"),
            )
            .expect("submit")
            .into_record();
        service
            .reject(&record.id, "Photo is blurred".to_string())
            .expect("reject");
        record.id
    };

    let reopened = JsonApplicationRepository::open(data_dir.path()).expect("reopen store");
    let record = reopened.fetch(&key).expect("fetch").expect("present");
    assert_eq!(record.status, ApplicationStatus::Rejected);
    assert_eq!(record.rejection_reason.as_deref(), Some("Photo is blurred"));
    assert_eq!(
        reopened
            .list(&ApplicationFilter::default())
            .expect("list")
            .len(),
        1
    );
    assert!(reopened
        .find_by_identity("asha@example.org", record.category)
        .expect("lookup")
        .is_some());
}
