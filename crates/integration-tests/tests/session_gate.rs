//! Sign-in, sign-out and the session gate.

#![allow(clippy::unwrap_used)]

use axum::http::{StatusCode, header};
use stockroom_core::UserRole;
use stockroom_dashboard::models::profile::USERS_COLLECTION;
use stockroom_integration_tests::{PASSWORD, TestApp};

#[tokio::test]
async fn test_api_without_session_is_unauthorized() {
    let mut app = TestApp::new();

    let response = app.get("/api/me").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(!response.error().is_empty());
}

#[tokio::test]
async fn test_page_without_session_redirects_to_login() {
    let mut app = TestApp::new();

    let response = app.get("/").await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.headers[header::LOCATION], "/login");
}

#[tokio::test]
async fn test_login_sets_session_and_returns_profile() {
    let mut app = TestApp::new();
    app.seed_user("picker-7", UserRole::Staff).await;

    let response = app.login("picker-7", PASSWORD).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["username"], "picker-7");
    assert_eq!(response.body["role"], "staff");
    assert!(app.cookie().is_some());

    let me = app.get("/api/me").await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["email"], "picker-7@example.com");
}

#[tokio::test]
async fn test_login_handle_is_case_insensitive() {
    let mut app = TestApp::new();
    app.seed_user("dana", UserRole::Admin).await;

    let response = app.login("  DANA ", PASSWORD).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_wrong_password_is_rejected_without_detail() {
    let mut app = TestApp::new();
    app.seed_user("dana", UserRole::Admin).await;

    let response = app.login("dana", "not-the-password").await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error(), "Invalid handle or password");
    assert!(app.cookie().is_none());
}

#[tokio::test]
async fn test_unknown_handle_never_reaches_identity_provider() {
    let mut app = TestApp::new();

    let response = app.login("nobody", PASSWORD).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error(), "Invalid handle or password");
    assert_eq!(app.backend.identity_calls(), 0);
}

#[tokio::test]
async fn test_malformed_handle_makes_no_backend_calls() {
    let mut app = TestApp::new();

    let response = app.login("x", PASSWORD).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.backend.total_calls(), 0);
}

#[tokio::test]
async fn test_empty_password_is_a_validation_error() {
    let mut app = TestApp::new();
    app.seed_user("dana", UserRole::Admin).await;

    let response = app.login("dana", "").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.backend.total_calls(), 0);
}

#[tokio::test]
async fn test_repeated_failures_are_rate_limited() {
    let mut app = TestApp::new();
    app.seed_user("dana", UserRole::Admin).await;

    for _ in 0..5 {
        let response = app.login("dana", "wrong-password").await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }
    let response = app.login("dana", "wrong-password").await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_logout_invalidates_the_old_cookie() {
    let mut app = TestApp::new();
    app.seed_user("dana", UserRole::Admin).await;
    app.login_ok("dana").await;
    let old_cookie = app.cookie().map(str::to_owned);

    let response = app.post("/api/auth/logout", serde_json::json!({})).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(app.cookie().is_none());

    app.set_cookie(old_cookie);
    assert_eq!(app.get("/api/me").await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_without_session_succeeds() {
    let mut app = TestApp::new();

    let response = app.post("/api/auth/logout", serde_json::json!({})).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_session_without_profile_is_unauthenticated() {
    let mut app = TestApp::new();
    let uid = app.seed_user("dana", UserRole::Admin).await;
    app.login_ok("dana").await;

    // Profile corrupted under a live session.
    app.backend
        .seed_document(USERS_COLLECTION, uid.as_str(), Default::default())
        .await;
    let corrupt = app.get("/api/me").await;
    assert_eq!(corrupt.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_staff_cannot_reach_admin_routes() {
    let mut app = TestApp::new();
    app.seed_user("picker-7", UserRole::Staff).await;
    app.login_ok("picker-7").await;

    let response = app.get("/api/users").await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health_needs_no_session() {
    let mut app = TestApp::new();

    assert_eq!(app.get("/health").await.status, StatusCode::OK);
    assert_eq!(app.get("/health/ready").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_expired_id_token_is_refreshed_transparently() {
    let mut app = TestApp::new();
    app.seed_user("picker-7", UserRole::Staff).await;
    app.login_ok("picker-7").await;

    app.backend.expire_tokens().await;
    let me = app.get("/api/me").await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["username"], "picker-7");

    let refreshes = app.backend.identity_calls();
    let again = app.get("/api/me").await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(app.backend.identity_calls(), refreshes + 1);
}

#[tokio::test]
async fn test_malformed_login_body_gets_json_error() {
    let mut app = TestApp::new();

    let missing_handle = app
        .post("/api/auth/login", serde_json::json!({ "password": PASSWORD }))
        .await;
    assert_eq!(missing_handle.status, StatusCode::BAD_REQUEST);
    assert!(missing_handle.error().starts_with("Bad request"));

    let wrong_shape = app
        .post("/api/auth/login", serde_json::json!("picker-7"))
        .await;
    assert_eq!(wrong_shape.status, StatusCode::BAD_REQUEST);
    assert!(!wrong_shape.error().is_empty());
}
