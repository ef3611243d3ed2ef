//! Editing the signed-in user's profile.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::{Value, json};
use stockroom_core::UserRole;
use stockroom_integration_tests::{PASSWORD, TestApp};

fn form(username: &str, name: &str, email: &str) -> Value {
    json!({ "username": username, "name": name, "email": email })
}

async fn signed_in_as(handle: &str) -> TestApp {
    let mut app = TestApp::new();
    app.seed_user(handle, UserRole::Staff).await;
    app.login_ok(handle).await;
    app
}

#[tokio::test]
async fn test_name_change_needs_no_password() {
    let mut app = signed_in_as("lee").await;
    let identity_calls = app.backend.identity_calls();

    let response = app
        .put("/api/me", form("lee", "Lee Park", "lee@example.com"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["name"], "Lee Park");

    // Only the session gate's token lookup.
    assert_eq!(app.backend.identity_calls(), identity_calls + 1);
    assert_eq!(app.get("/api/me").await.body["name"], "Lee Park");
}

#[tokio::test]
async fn test_handle_change_is_used_for_next_login() {
    let mut app = signed_in_as("lee").await;

    let response = app
        .put("/api/me", form("lee.park", "Lee", "lee@example.com"))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["username"], "lee.park");

    app.forget_cookie();
    assert_eq!(
        app.login("lee", PASSWORD).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(app.login("lee.park", PASSWORD).await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_handle_owned_by_someone_else_conflicts() {
    let mut app = signed_in_as("lee").await;
    app.seed_user("dana", UserRole::Admin).await;

    let response = app
        .put("/api/me", form("dana", "Lee", "lee@example.com"))
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_email_change_requires_current_password() {
    let mut app = signed_in_as("lee").await;

    let response = app
        .put("/api/me", form("lee", "Lee", "lee.park@example.com"))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.get("/api/me").await.body["email"], "lee@example.com");
}

#[tokio::test]
async fn test_wrong_current_password_changes_nothing() {
    let mut app = signed_in_as("lee").await;

    let mut body = form("lee", "Lee Park", "lee.park@example.com");
    body["current_password"] = json!("guess-again");
    let response = app.put("/api/me", body).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error(), "Current password is incorrect");

    let me = app.get("/api/me").await;
    assert_eq!(me.body["email"], "lee@example.com");
    assert_ne!(me.body["name"], "Lee Park");
}

#[tokio::test]
async fn test_email_change_with_reauthentication() {
    let mut app = signed_in_as("lee").await;
    let cookie_before = app.cookie().map(str::to_owned);

    let mut body = form("lee", "Lee", "lee.park@example.com");
    body["current_password"] = json!(PASSWORD);
    let response = app.put("/api/me", body).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["email"], "lee.park@example.com");

    // The refreshed provider session is stored under a new session id.
    assert_ne!(app.cookie().map(str::to_owned), cookie_before);
    assert_eq!(app.get("/api/me").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_email_already_in_use_conflicts() {
    let mut app = signed_in_as("lee").await;
    app.seed_user("dana", UserRole::Admin).await;

    let mut body = form("lee", "Lee", "dana@example.com");
    body["current_password"] = json!(PASSWORD);
    let response = app.put("/api/me", body).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_password_change_takes_effect() {
    let mut app = signed_in_as("lee").await;

    let mut body = form("lee", "Lee", "lee@example.com");
    body["current_password"] = json!(PASSWORD);
    body["new_password"] = json!("battery-staple");
    body["confirm_password"] = json!("battery-staple");
    let response = app.put("/api/me", body).await;
    assert_eq!(response.status, StatusCode::OK);

    app.forget_cookie();
    assert_eq!(
        app.login("lee", PASSWORD).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(app.login("lee", "battery-staple").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_password_confirmation_must_match() {
    let mut app = signed_in_as("lee").await;

    let mut body = form("lee", "Lee", "lee@example.com");
    body["current_password"] = json!(PASSWORD);
    body["new_password"] = json!("battery-staple");
    body["confirm_password"] = json!("battery-stapel");
    let response = app.put("/api/me", body).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_blank_name_is_rejected() {
    let mut app = signed_in_as("lee").await;

    let response = app.put("/api/me", form("lee", "   ", "lee@example.com")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error(), "Name is required");
}

#[tokio::test]
async fn test_failed_profile_write_leaves_sign_in_intact() {
    let mut app = signed_in_as("lee").await;
    app.backend
        .fail_writes(stockroom_dashboard::models::profile::USERS_COLLECTION)
        .await;

    let mut body = form("lee", "Lee", "lee.park@example.com");
    body["current_password"] = json!(PASSWORD);
    let response = app.put("/api/me", body).await;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);

    app.forget_cookie();
    app.login_ok("lee").await;
    assert_eq!(app.get("/api/me").await.body["email"], "lee@example.com");
}

#[tokio::test]
async fn test_incomplete_form_gets_json_error() {
    let mut app = signed_in_as("lee").await;

    let response = app.put("/api/me", json!({ "name": "Lee" })).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(!response.error().is_empty());
}
