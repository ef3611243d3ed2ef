//! Health check handlers.

use axum::{extract::State, http::StatusCode};

use crate::models::profile::USERS_COLLECTION;
use crate::state::AppState;

/// Document id that is never written; reading it only proves reachability.
const READINESS_DOC_ID: &str = "__readiness_check__";

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the document store is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state
        .backends()
        .store
        .get_document(USERS_COLLECTION, READINESS_DOC_ID)
        .await
    {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
