//! Integration tests — build the router over an in-memory store and a manual
//! clock, then drive it with `oneshot`.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::{DateTime, Duration, Utc};
use mealbridge_api::{AppState, config::ApiConfig};
use mealbridge_core::clock::ManualClock;
use mealbridge_core::config::AuthConfig;
use mealbridge_core::store::InMemoryCredentialStore;
use serde_json::{Value, json};
use tower::ServiceExt;

const PASSWORD: &str = "Abc12345!";

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
}

fn test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("mealbridge_core=debug,mealbridge_api=debug")
        .try_init();
    let clock = Arc::new(ManualClock::new(
        DateTime::<Utc>::from_timestamp(1_760_000_000, 0).expect("timestamp"),
    ));
    let mut auth = AuthConfig::with_secret("integration-test-secret");
    auth.bcrypt_cost = 4;
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        pg_connection_url: "postgres://unused".into(),
        auth,
    };
    let state = AppState::new(config, Arc::new(InMemoryCredentialStore::new()), clock.clone())
        .expect("default policy");
    TestApp {
        router: mealbridge_api::router(state),
        clock,
    }
}

impl TestApp {
    async fn send(
        &self,
        method: Method,
        uri: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = bearer {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        let req = match body {
            Some(json) => req
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let resp = self.router.clone().oneshot(req).await.expect("request");
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("parse JSON")
        };
        (status, json)
    }

    async fn register(&self, email: &str, is_owner: bool) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({ "email": email, "password": PASSWORD, "isOwner": is_owner })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "register {email}: {body}");
        body
    }

    async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }
}

fn access_token(body: &Value) -> String {
    body["accessToken"].as_str().expect("accessToken").to_string()
}

#[tokio::test]
async fn register_returns_token_response() {
    let app = test_app();
    let body = app.register("a@x.com", false).await;

    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["expiresIn"], 86_400);
    assert!(body["refreshToken"].is_string());
    assert_eq!(body["user"]["email"], "a@x.com");
    // First principal ever registered is the administrator.
    assert_eq!(body["user"]["roles"], json!(["ADMIN", "CLIENT"]));
    assert!(body["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn register_with_profile_fields() {
    let app = test_app();
    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({
                "email": "owner@x.com",
                "password": PASSWORD,
                "isOwner": true,
                "firstName": "Asha",
                "gender": "FEMALE",
                "dob": "1990-05-17",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["kind"], "owner");
    assert_eq!(body["user"]["firstName"], "Asha");
    assert_eq!(body["user"]["salutation"], "Ms.");
    assert_eq!(body["user"]["dob"], "1990-05-17");
}

#[tokio::test]
async fn duplicate_registration_is_conflict() {
    let app = test_app();
    app.register("a@x.com", false).await;
    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": "A@X.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_identity");
}

#[tokio::test]
async fn weak_password_is_bad_request() {
    let app = test_app();
    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": "a@x.com", "password": "password" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn profile_requires_valid_token() {
    let app = test_app();
    let token = access_token(&app.register("a@x.com", false).await);

    let (status, body) = app
        .send(Method::GET, "/api/auth/profile", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "a@x.com");

    // No token: the gate lets it through anonymously and the policy denies.
    let (status, body) = app.send(Method::GET, "/api/auth/profile", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    // A presented but undecodable token fails at the gate.
    let (status, body) = app
        .send(Method::GET, "/api/auth/profile", Some("garbage"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_malformed");
}

#[tokio::test]
async fn tampered_and_expired_tokens_are_unauthorized() {
    let app = test_app();
    let token = access_token(&app.register("a@x.com", false).await);

    let (head, sig) = token.rsplit_once('.').expect("jwt");
    let swapped = if sig.starts_with('x') { 'y' } else { 'x' };
    let tampered = format!("{head}.{swapped}{}", &sig[1..]);
    let (status, body) = app
        .send(Method::GET, "/api/auth/profile", Some(&tampered), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_invalid");

    app.clock.advance(Duration::hours(24));
    let (status, body) = app
        .send(Method::GET, "/api/auth/profile", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_expired");
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let app = test_app();
    let body = app.register("a@x.com", false).await;
    let refresh = body["refreshToken"].as_str().expect("refreshToken");

    let (status, body) = app
        .send(Method::GET, "/api/auth/profile", Some(refresh), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_invalid");
}

#[tokio::test]
async fn refresh_flow() {
    let app = test_app();
    let registered = app.register("a@x.com", false).await;

    app.clock.advance(Duration::hours(2));
    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refreshToken": registered["refreshToken"] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["accessToken"], registered["accessToken"]);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/refresh",
            None,
            Some(json!({ "refreshToken": registered["accessToken"] })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_invalid");
}

#[tokio::test]
async fn admin_route_pins_403_for_missing_or_insufficient_authority() {
    let app = test_app();
    let admin = access_token(&app.register("admin@x.com", false).await);
    let client = access_token(&app.register("c@x.com", false).await);
    let change = json!({ "email": "c@x.com", "roles": ["ASSISTANT", "ROLE_CLIENT"] });

    let (status, _) = app
        .send(Method::PUT, "/api/auth/roles", None, Some(change.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::PUT, "/api/auth/roles", Some(&client), Some(change.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, body) = app
        .send(Method::PUT, "/api/auth/roles", Some(&admin), Some(change))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roles"], json!(["ASSISTANT", "CLIENT"]));

    let (status, body) = app
        .send(
            Method::PUT,
            "/api/auth/roles",
            Some(&admin),
            Some(json!({ "email": "c@x.com", "roles": ["SUPERUSER"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/disable",
            Some(&admin),
            Some(json!({ "email": "ghost@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn lockout_scenario_over_http() {
    let app = test_app();
    app.register("a@x.com", false).await;

    for _ in 0..4 {
        let (status, body) = app.login("a@x.com", "wrong").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_credentials");
    }
    let (status, body) = app.login("a@x.com", "wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "account_locked");

    let (_, body) = app.login("a@x.com", PASSWORD).await;
    assert_eq!(body["error"], "account_locked");

    app.clock.advance(Duration::minutes(31));
    let (status, body) = app.login("a@x.com", PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["user"]["lockedUntil"].is_null());
}

#[tokio::test]
async fn unknown_account_login_looks_like_bad_password() {
    let app = test_app();
    let (status, body) = app.login("ghost@x.com", PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credentials");
}

#[tokio::test]
async fn admin_unlock_disable_enable() {
    let app = test_app();
    let admin = access_token(&app.register("admin@x.com", false).await);
    let owner = access_token(&app.register("owner@x.com", true).await);

    for _ in 0..5 {
        app.login("owner@x.com", "wrong").await;
    }
    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/unlock",
            Some(&admin),
            Some(json!({ "email": "owner@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["lockedUntil"].is_null());
    assert_eq!(app.login("owner@x.com", PASSWORD).await.0, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/disable",
            Some(&admin),
            Some(json!({ "email": "owner@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], false);

    let (status, body) = app.login("owner@x.com", PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "account_disabled");

    // A still-valid token for a disabled account carries no identity.
    let (status, _) = app
        .send(Method::GET, "/api/auth/profile", Some(&owner), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/enable",
            Some(&admin),
            Some(json!({ "email": "owner@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.login("owner@x.com", PASSWORD).await.0, StatusCode::OK);
}

#[tokio::test]
async fn token_status_is_public() {
    let app = test_app();
    let token = access_token(&app.register("a@x.com", false).await);

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/auth/token-status?token={token}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expired"], false);
    assert!(body["expiresAt"].is_string());

    app.clock.advance(Duration::days(1));
    let (status, body) = app
        .send(Method::GET, "/api/auth/token-status", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expired"], true);
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let app = test_app();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "a@x.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(
        body["message"],
        "Request body is missing required fields or has invalid values"
    );

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/register")
        .body(Body::from(r#"{"email":"a@x.com","password":"Abc12345!"}"#))
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.expect("request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = app.router.clone().oneshot(req).await.expect("request");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json: Value = serde_json::from_slice(&bytes).expect("parse JSON");
    assert_eq!(json["message"], "Request body is not valid JSON");
}

#[tokio::test]
async fn health_is_public() {
    let app = test_app();
    let (status, body) = app.send(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
