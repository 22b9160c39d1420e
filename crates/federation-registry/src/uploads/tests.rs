use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use super::*;

const BOUNDARY: &str = "registry-test-boundary";

fn gateway(max_bytes: usize) -> (Arc<UploadGateway<InMemoryObjectStore>>, Arc<InMemoryObjectStore>) {
    let store = Arc::new(InMemoryObjectStore::default());
    let gateway = Arc::new(UploadGateway::new(
        store.clone(),
        UploadPolicy::new(max_bytes),
        "http://files.test/",
    ));
    (gateway, store)
}

fn file(name: &str, content_type: Option<&str>, bytes: &[u8]) -> IncomingFile {
    IncomingFile {
        file_name: name.to_string(),
        content_type: content_type.map(str::to_string),
        bytes: bytes.to_vec(),
    }
}

fn multipart_body(parts: &[(&str, &str, &str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, file_name, content_type, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(bytes.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn limit_is_inclusive() {
    let (gateway, store) = gateway(8);

    let exact = gateway
        .upload(file("scan.pdf", Some("application/pdf"), b"12345678"))
        .await
        .expect("exactly at the limit is accepted");
    assert_eq!(exact.size, 8);

    let err = gateway
        .upload(file("scan.pdf", Some("application/pdf"), b"123456789"))
        .await
        .expect_err("one byte over");
    assert!(matches!(err, UploadError::TooLarge { limit: 8 }));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn default_policy_takes_megabyte_pdfs_and_refuses_oversize_or_executables() {
    let (gateway, store) = gateway(crate::config::DEFAULT_UPLOAD_MAX_BYTES);
    const MIB: usize = 1024 * 1024;

    let pdf = gateway
        .upload(file("form.pdf", Some("application/pdf"), &vec![0u8; MIB]))
        .await
        .expect("1 MiB pdf");
    assert_eq!(pdf.size, MIB as u64);

    let oversize = gateway
        .upload(file("scan.jpg", Some("image/jpeg"), &vec![0u8; 11 * MIB]))
        .await
        .expect_err("11 MiB image");
    assert!(matches!(oversize, UploadError::TooLarge { .. }));

    let binary = gateway
        .upload(file("setup", Some("text/x-executable"), b"\x7fELF"))
        .await
        .expect_err("executable");
    assert!(matches!(binary, UploadError::UnsupportedType { .. }));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn every_upload_creates_a_new_object() {
    let (gateway, store) = gateway(1024);

    let first = gateway
        .upload(file("photo.png", None, b"png"))
        .await
        .expect("first");
    let second = gateway
        .upload(file("photo.png", None, b"png"))
        .await
        .expect("second");

    assert_ne!(first.key, second.key);
    assert_eq!(first.content_type, "image/png");
    assert_eq!(first.url, format!("http://files.test/files/{}", first.key));
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn batch_is_checked_before_anything_is_stored() {
    let (gateway, store) = gateway(1024);

    let err = gateway
        .upload_all(vec![
            file("photo.png", None, b"png"),
            file("archive.zip", Some("application/zip"), b"zip"),
        ])
        .await
        .expect_err("zip refused");

    assert!(matches!(err, UploadError::UnsupportedType { .. }));
    assert!(store.is_empty());
}

#[tokio::test]
async fn single_route_stores_and_serves_file() {
    let (gateway, _) = gateway(1024);
    let router = upload_router(gateway);

    let response = router
        .clone()
        .oneshot(multipart_request(
            "/uploads/single",
            multipart_body(&[("file", "Birth Cert.pdf", "application/pdf", "%PDF-1.7")]),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let payload = read_json(response).await;
    assert_eq!(payload["success"], Value::Bool(true));
    assert_eq!(payload["data"]["originalName"], "Birth Cert.pdf");
    let key = payload["data"]["key"].as_str().expect("key").to_string();
    assert!(key.starts_with("uploads/") && key.ends_with(".pdf"));

    let fetched = router
        .oneshot(
            Request::get(format!("/files/{key}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(
        fetched.headers()[header::CONTENT_TYPE],
        "application/pdf"
    );
    assert_eq!(fetched.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(fetched.headers()[header::CONTENT_DISPOSITION], "inline");
}

#[tokio::test]
async fn served_files_are_downloads_unless_safe_to_render() {
    let (gateway, store) = gateway(1024);
    let router = upload_router(gateway);

    let svg = router
        .clone()
        .oneshot(multipart_request(
            "/uploads/single",
            multipart_body(&[(
                "file",
                "badge.svg",
                "image/svg+xml",
                "<svg onload=\"alert(1)\"/>",
            )]),
        ))
        .await
        .expect("route executes");
    assert_eq!(svg.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert!(store.is_empty());

    let csv = router
        .clone()
        .oneshot(multipart_request(
            "/uploads/single",
            multipart_body(&[("file", "roster.csv", "text/csv", "name,club")]),
        ))
        .await
        .expect("route executes");
    assert_eq!(csv.status(), StatusCode::OK);
    let key = read_json(csv).await["data"]["key"]
        .as_str()
        .expect("key")
        .to_string();

    let fetched = router
        .oneshot(
            Request::get(format!("/files/{key}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(fetched.status(), StatusCode::OK);
    assert_eq!(fetched.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(fetched.headers()[header::CONTENT_DISPOSITION], "attachment");
}

#[tokio::test]
async fn single_route_maps_policy_failures_to_statuses() {
    let (gateway, _) = gateway(4);
    let router = upload_router(gateway);

    let unsupported = router
        .clone()
        .oneshot(multipart_request(
            "/uploads/single",
            multipart_body(&[("file", "a.zip", "application/zip", "zip")]),
        ))
        .await
        .expect("route executes");
    assert_eq!(unsupported.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let oversize = router
        .clone()
        .oneshot(multipart_request(
            "/uploads/single",
            multipart_body(&[("file", "a.pdf", "application/pdf", "too large")]),
        ))
        .await
        .expect("route executes");
    assert_eq!(oversize.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let missing = router
        .oneshot(multipart_request(
            "/uploads/single",
            multipart_body(&[("other", "a.pdf", "application/pdf", "pdf")]),
        ))
        .await
        .expect("route executes");
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    let payload = read_json(missing).await;
    assert_eq!(payload["success"], Value::Bool(false));
}

#[tokio::test]
async fn multiple_route_returns_one_reference_per_file() {
    let (gateway, store) = gateway(1024);
    let router = upload_router(gateway);

    let response = router
        .oneshot(multipart_request(
            "/uploads/multiple",
            multipart_body(&[
                ("files", "front.jpg", "image/jpeg", "front"),
                ("files", "back.jpg", "image/jpeg", "back"),
            ]),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn unknown_files_are_not_found() {
    let (gateway, _) = gateway(1024);
    let response = upload_router(gateway)
        .oneshot(
            Request::get("/files/uploads/2024/01/01/missing.pdf")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
