//! Integration test harness for the Stockroom dashboard.
//!
//! Drives the real router in-process against the in-memory backend,
//! carrying the session cookie between requests the way a browser would.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p stockroom-integration-tests
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::missing_panics_doc, clippy::unwrap_used)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tower::ServiceExt;

use stockroom_core::{CollectionName, Email, UserRole, UserUid};
use stockroom_dashboard::backend::memory::MemoryBackend;
use stockroom_dashboard::backend::{Backends, FieldValue, Fields};
use stockroom_dashboard::config::{DashboardConfig, default_tracked_collections};
use stockroom_dashboard::middleware::SESSION_COOKIE_NAME;
use stockroom_dashboard::models::profile::{USERS_COLLECTION, fields};
use stockroom_dashboard::models::view_state::VIEW_STATE_COLLECTION;
use stockroom_dashboard::routes::build_router;
use stockroom_dashboard::services::notifications::CREATED_AT_FIELD;
use stockroom_dashboard::state::AppState;

/// Password given to every seeded account.
pub const PASSWORD: &str = "correct-horse";

/// A decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// JSON body, or `Value::Null` when the body is empty or not JSON.
    pub body: Value,
}

impl TestResponse {
    /// The `error` message of a JSON error body.
    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

/// One browser session against a fresh dashboard.
pub struct TestApp {
    pub backend: MemoryBackend,
    router: Router,
    cookie: Option<String>,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    /// Dashboard tracking the default collections.
    pub fn new() -> Self {
        Self::with_tracked(default_tracked_collections())
    }

    /// Dashboard tracking `tracked`.
    pub fn with_tracked(tracked: Vec<CollectionName>) -> Self {
        let backend = MemoryBackend::new();
        let backends = Backends {
            identity: std::sync::Arc::new(backend.clone()),
            store: std::sync::Arc::new(backend.clone()),
        };
        let state = AppState::new(DashboardConfig::local(tracked), backends);
        Self {
            backend,
            router: build_router(state),
            cookie: None,
        }
    }

    /// Create an account and profile for `handle` with email
    /// `{handle}@example.com` and password [`PASSWORD`].
    pub async fn seed_user(&self, handle: &str, role: UserRole) -> UserUid {
        let email = Email::parse(&format!("{handle}@example.com")).unwrap();
        let uid = self.backend.seed_account(&email, PASSWORD).await.unwrap();
        self.backend
            .seed_document(
                USERS_COLLECTION,
                uid.as_str(),
                Fields::from([
                    (fields::UID.to_owned(), uid.as_str().into()),
                    (fields::USERNAME.to_owned(), handle.into()),
                    (fields::EMAIL.to_owned(), email.as_str().into()),
                    (fields::ROLE.to_owned(), role.as_str().into()),
                    (fields::NAME.to_owned(), format!("User {handle}").into()),
                    (fields::CREATED_AT.to_owned(), FieldValue::ServerTimestamp),
                ]),
            )
            .await;
        uid
    }

    /// Set a user's last-viewed time for `collection`.
    pub async fn seed_last_viewed(&self, uid: &UserUid, collection: &str, at: DateTime<Utc>) {
        let mut state = self
            .backend
            .peek_document(VIEW_STATE_COLLECTION, uid.as_str())
            .await
            .unwrap_or_default();
        state.insert(collection.to_owned(), at.into());
        self.backend
            .seed_document(VIEW_STATE_COLLECTION, uid.as_str(), state)
            .await;
    }

    /// Add an item to `collection` created at `at`.
    pub async fn seed_item(&self, collection: &str, id: &str, at: DateTime<Utc>) {
        self.backend
            .seed_document(
                collection,
                id,
                Fields::from([(CREATED_AT_FIELD.to_owned(), at.into())]),
            )
            .await;
    }

    /// Sign in through the API, keeping the session cookie on success.
    pub async fn login(&mut self, handle: &str, password: &str) -> TestResponse {
        self.send(
            Method::POST,
            "/api/auth/login",
            Some(serde_json::json!({ "handle": handle, "password": password })),
        )
        .await
    }

    /// Sign in, panicking on failure.
    pub async fn login_ok(&mut self, handle: &str) {
        let response = self.login(handle, PASSWORD).await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {response:?}");
    }

    /// Drop the cookie, as if the browser were closed.
    pub fn forget_cookie(&mut self) {
        self.cookie = None;
    }

    /// Current session cookie (`name=value`), if any.
    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    /// Replace the session cookie.
    pub fn set_cookie(&mut self, cookie: Option<String>) {
        self.cookie = cookie;
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&mut self, path: &str, body: Value) -> TestResponse {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put(&mut self, path: &str, body: Value) -> TestResponse {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&mut self, path: &str) -> TestResponse {
        self.send(Method::DELETE, path, None).await
    }

    /// Send a request with the current cookie and record any new one.
    pub async fn send(&mut self, method: Method, path: &str, body: Option<Value>) -> TestResponse {
        let mut request = Request::builder().method(method).uri(path);
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(json) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        self.remember_cookie(&headers);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            headers,
            body,
        }
    }

    fn remember_cookie(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(header::SET_COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            let Some(pair) = value.split(';').next() else {
                continue;
            };
            if !pair.starts_with(&format!("{SESSION_COOKIE_NAME}=")) {
                continue;
            }
            let removed = value.contains("Max-Age=0") || pair.ends_with('=');
            self.cookie = (!removed).then(|| pair.to_owned());
        }
    }
}
