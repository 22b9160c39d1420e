use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use serde::Deserialize;

use crate::api::{self, ApiFailure};

use super::domain::{NewUser, UserId};
use super::repository::UserRepository;
use super::service::AccountService;

pub fn accounts_router<U>(service: Arc<AccountService<U>>) -> Router
where
    U: UserRepository + 'static,
{
    Router::new()
        .route("/register", post(register_handler::<U>))
        .route("/login", post(login_handler::<U>))
        .route("/users/:user_id", get(user_handler::<U>))
        .with_state(service)
}

pub(crate) async fn register_handler<U>(
    State(service): State<Arc<AccountService<U>>>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> Result<Response, ApiFailure>
where
    U: UserRepository + 'static,
{
    let Json(new_user) = payload.map_err(|rejection| api::malformed(rejection.body_text()))?;
    let summary = service
        .blocking(move |service| service.register(new_user))
        .await?;
    Ok(api::success_with_message(
        StatusCode::CREATED,
        "User registered successfully",
        summary,
    ))
}

pub(crate) async fn user_handler<U>(
    State(service): State<Arc<AccountService<U>>>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiFailure>
where
    U: UserRepository + 'static,
{
    let id = UserId(user_id);
    let summary = service.blocking(move |service| service.get(&id)).await?;
    Ok(api::success(StatusCode::OK, summary))
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

pub(crate) async fn login_handler<U>(
    State(service): State<Arc<AccountService<U>>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiFailure>
where
    U: UserRepository + 'static,
{
    let Json(request) = payload.map_err(|rejection| api::malformed(rejection.body_text()))?;
    let summary = service
        .blocking(move |service| service.authenticate(&request.email, &request.password))
        .await?;
    Ok(api::success_with_message(
        StatusCode::OK,
        "Signed in",
        summary,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryUserRepository;
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router() -> Router {
        accounts_router(Arc::new(AccountService::new(Arc::new(
            InMemoryUserRepository::default(),
        ))))
    }

    fn register_request(body: &Value) -> Request<Body> {
        Request::post("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn read_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn register_returns_summary_without_hash() {
        let router = router();
        let body = json!({
            "name": "Ravi Kulkarni",
            "email": "ravi@example.org",
            "password": "parry-and-riposte",
            "role": "coach"
        });

        let response = router
            .clone()
            .oneshot(register_request(&body))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);
        let payload = read_json(response).await;
        assert_eq!(payload["message"], json!("User registered successfully"));
        assert_eq!(payload["data"]["role"], json!("coach"));
        assert!(payload["data"].get("passwordHash").is_none());
        assert!(payload["data"].get("password").is_none());

        let id = payload["data"]["id"].as_str().expect("id");
        let fetched = router
            .clone()
            .oneshot(
                Request::get(format!("/users/{id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");
        assert_eq!(fetched.status(), StatusCode::OK);

        let duplicate = router
            .oneshot(register_request(&body))
            .await
            .expect("route executes");
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    }

    fn login_request(email: &str, password: &str) -> Request<Body> {
        Request::post("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "email": email, "password": password }).to_string(),
            ))
            .expect("request")
    }

    #[tokio::test]
    async fn login_checks_the_stored_hash() {
        let router = router();
        let registered = router
            .clone()
            .oneshot(register_request(&json!({
                "name": "Ravi Kulkarni",
                "email": "ravi@example.org",
                "password": "parry-and-riposte"
            })))
            .await
            .expect("route executes");
        assert_eq!(registered.status(), StatusCode::CREATED);

        let signed_in = router
            .clone()
            .oneshot(login_request("Ravi@Example.org", "parry-and-riposte"))
            .await
            .expect("route executes");
        assert_eq!(signed_in.status(), StatusCode::OK);
        let payload = read_json(signed_in).await;
        assert_eq!(payload["data"]["email"], json!("ravi@example.org"));
        assert!(payload["data"].get("passwordHash").is_none());

        let refused = router
            .clone()
            .oneshot(login_request("ravi@example.org", "wrong-password"))
            .await
            .expect("route executes");
        assert_eq!(refused.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(read_json(refused).await["success"], json!(false));

        let blank = router
            .oneshot(login_request("ravi@example.org", " "))
            .await
            .expect("route executes");
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_rejects_unknown_role() {
        let response = router()
            .oneshot(register_request(&json!({
                "name": "Ravi",
                "email": "ravi@example.org",
                "password": "parry-and-riposte",
                "role": "spectator"
            })))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
