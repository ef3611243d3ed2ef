//! HTTP route handlers for the dashboard.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                                  - Liveness
//! GET    /health/ready                            - Backend reachability
//!
//! GET    /                                        - Dashboard overview (profile + counts)
//! GET    /login                                   - Where to sign in
//!
//! POST   /api/auth/login                          - Sign in with handle and password
//! POST   /api/auth/logout                         - Sign out
//!
//! GET    /api/me                                  - Current profile
//! PUT    /api/me                                  - Edit profile
//!
//! GET    /api/notifications                       - Unseen counts
//! POST   /api/notifications/{collection}/viewed   - Mark a collection viewed
//!
//! GET    /api/users                               - List users (admin)
//! POST   /api/users                               - Create user (admin)
//! PUT    /api/users/{uid}/role                    - Change role (admin)
//! DELETE /api/users/{uid}                         - Delete profile (admin)
//! ```

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::create_session_layer;
use crate::state::AppState;

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod me;
pub mod notifications;
pub mod users;

/// All routes, without state or layers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/", get(dashboard::index))
        .route("/login", get(dashboard::login_page))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/me", get(me::show).put(me::update))
        .route("/api/notifications", get(notifications::index))
        .route(
            "/api/notifications/{collection}/viewed",
            post(notifications::mark_viewed),
        )
        .route("/api/users", get(users::index).post(users::create))
        .route("/api/users/{uid}", delete(users::delete))
        .route("/api/users/{uid}/role", put(users::set_role))
}

/// Build the application router with sessions and request tracing.
///
/// Sentry layers are added by the binary so tests run without a client.
pub fn build_router(state: AppState) -> Router {
    let session_layer = create_session_layer(state.config());

    routes()
        .layer(session_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
