//! HTTP 계층 통합 테스트.
//!
//! 메모리 저장소 위에 전체 `/api` 라우터를 구성하고 `oneshot`으로 요청을 보냅니다.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use gatehouse_api::middleware::{RateLimitConfig, RateLimitState};
use gatehouse_api::routes::{create_api_router, create_health_router};
use gatehouse_api::state::AppState;
use gatehouse_core::{AppConfig, InMemoryCredentialStore, Registration};
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;

const TEST_SECRET: &str = "integration-test-secret-key-minimum-32-chars";

fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.token.secret = SecretString::new(TEST_SECRET.into());
    config.password.memory_kib = 1024;
    config.password.iterations = 1;
    config.password.parallelism = 1;
    config
}

fn build_state(config: &AppConfig) -> AppState {
    AppState::from_config(config, Arc::new(InMemoryCredentialStore::new())).unwrap()
}

fn app(state: AppState) -> Router {
    let state = Arc::new(state);
    Router::new()
        .merge(create_health_router(state.clone()))
        .merge(create_api_router(state))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn send_raw(
    app: &Router,
    uri: &str,
    body: &str,
    forwarded_for: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(forwarded_for) = forwarded_for {
        builder = builder.header("x-forwarded-for", forwarded_for);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn register(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "password": password,
            "email": format!("{}@example.com", username),
            "name": username,
        })),
    )
    .await
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await
}

async fn login_token(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = login(app, username, password).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_register_login_and_role_gated_access() {
    let app = app(build_state(&test_config()));

    let (status, user) = register(&app, "alice", "pw123").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["username"], "alice");
    assert_eq!(user["roles"], json!(["USER"]));
    assert!(user.get("password_hash").is_none());

    let (status, body) = login(&app, "alice", "pw123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "Bearer");
    assert_eq!(body["username"], "alice");
    let token = body["token"].as_str().unwrap();

    let (status, body) = send(&app, Method::GET, "/api/resources/user", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject"], "alice");

    let (status, body) = send(&app, Method::GET, "/api/resources/admin", Some(token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, body) = send(&app, Method::GET, "/api/resources/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roles"], json!(["USER"]));
}

#[tokio::test]
async fn test_authentication_failures_look_identical() {
    let app = app(build_state(&test_config()));
    register(&app, "alice", "pw123").await;

    let (wrong_status, wrong_password) = login(&app, "alice", "nope!").await;
    let (ghost_status, ghost) = login(&app, "ghost", "pw123").await;
    let (missing_status, missing) =
        send(&app, Method::GET, "/api/resources/me", None, None).await;
    let (garbage_status, garbage) = send(
        &app,
        Method::GET,
        "/api/resources/me",
        Some("not-a-token"),
        None,
    )
    .await;

    for (status, body) in [
        (wrong_status, &wrong_password),
        (ghost_status, &ghost),
        (missing_status, &missing),
        (garbage_status, &garbage),
    ] {
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");
        assert_eq!(body["message"], wrong_password["message"]);
    }
}

#[tokio::test]
async fn test_unparseable_login_body_is_plain_401() {
    let app = app(build_state(&test_config()));
    register(&app, "alice", "pw123").await;
    let (_, wrong_password) = login(&app, "alice", "nope!").await;

    for body in [r#"{"username":"alice"}"#, "not json", r#"{"username":1,"password":2}"#] {
        let (status, response) = send_raw(&app, "/api/auth/login", body, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "body: {}", body);
        assert_eq!(response["code"], "UNAUTHORIZED");
        assert_eq!(response["message"], wrong_password["message"]);
    }
}

#[tokio::test]
async fn test_unparseable_register_body_is_validation_error() {
    let app = app(build_state(&test_config()));

    for body in [r#"{"username":"alice"}"#, "not json"] {
        let (status, response) = send_raw(&app, "/api/auth/register", body, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(response["code"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn test_username_length_is_checked_after_trimming() {
    let app = app(build_state(&test_config()));

    let (status, body) = register(&app, "  ab  ", "pw123").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].get("username").is_some());

    let (status, user) = send(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "  bob  ",
            "password": "pw123",
            "email": "bob@example.com",
            "name": "Bob",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["username"], "bob");
}

#[tokio::test]
async fn test_registration_conflicts_and_validation() {
    let app = app(build_state(&test_config()));

    let (status, _) = register(&app, "alice", "pw123").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = register(&app, "alice", "other-password").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DUPLICATE_USERNAME");

    // 기존 비밀번호는 그대로
    let (status, _) = login(&app, "alice", "pw123").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = register(&app, "al", "pw").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["details"].get("username").is_some());
}

#[tokio::test]
async fn test_admin_account_management() {
    let state = build_state(&test_config());
    state
        .auth
        .bootstrap_user(Registration {
            username: "root".to_string(),
            password: "root-password".to_string(),
            email: "root@example.com".to_string(),
            name: "Root".to_string(),
        })
        .await
        .unwrap();
    let app = app(state);

    register(&app, "alice", "pw123").await;
    let alice_token = login_token(&app, "alice", "pw123").await;
    let admin_token = login_token(&app, "root", "root-password").await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/resources/admin/users",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    // USER 토큰으로는 관리자 라우트 접근 불가
    let (status, _) = send(
        &app,
        Method::GET,
        "/api/resources/admin/users",
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/resources/admin/users/alice/roles",
        Some(&admin_token),
        Some(json!({ "roles": ["role_admin", "user"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["roles"], json!(["ADMIN", "USER"]));

    // 이미 발급된 토큰은 이전 역할 유지
    let (status, _) = send(
        &app,
        Method::GET,
        "/api/resources/admin",
        Some(&alice_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let new_token = login_token(&app, "alice", "pw123").await;
    let (status, _) = send(
        &app,
        Method::GET,
        "/api/resources/admin",
        Some(&new_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/resources/admin/users/alice/roles",
        Some(&admin_token),
        Some(json!({ "roles": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/resources/admin/users/ghost/roles",
        Some(&admin_token),
        Some(json!({ "roles": ["USER"] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/api/resources/admin/users/alice",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/api/resources/admin/users/alice",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = login(&app, "alice", "pw123").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_configured_rule_extends_contract() {
    let mut config = test_config();
    config.gate.rules = vec![gatehouse_core::config::RouteRuleConfig {
        pattern: "/api/resources/me".to_string(),
        access: "role".to_string(),
        roles: vec!["MANAGER".to_string()],
    }];
    let app = app(build_state(&config));

    register(&app, "alice", "pw123").await;
    let token = login_token(&app, "alice", "pw123").await;

    let (status, _) = send(&app, Method::GET, "/api/resources/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_login_is_rate_limited() {
    let state = build_state(&test_config()).with_rate_limit(RateLimitState::new(RateLimitConfig {
        requests_per_minute: 60,
        burst_size: 0,
        ..Default::default()
    }));
    let app = app(state);

    let (status, _) = login(&app, "ghost", "pw123").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = login(&app, "ghost", "pw123").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");

    // 전달 헤더를 바꿔도 같은 연결이면 계속 제한
    for i in 1..10 {
        let (status, _) = send_raw(
            &app,
            "/api/auth/login",
            r#"{"username":"ghost","password":"pw123"}"#,
            Some(&format!("10.0.0.{}", i)),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    }

    // 보호 리소스는 rate limit 대상이 아님
    let (status, _) = send(&app, Method::GET, "/api/resources/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_infrastructure_routes_bypass_gate() {
    let app = app(build_state(&test_config()));

    let (status, _) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _) = send(&app, Method::GET, "/api/unknown", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
