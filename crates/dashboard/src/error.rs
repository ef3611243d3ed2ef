//! Unified error handling for the dashboard.

use axum::{
    Json,
    extract::{FromRequest, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use stockroom_core::UserUid;

use crate::services::AccountError;

/// Application-level error type for the dashboard.
#[derive(Debug, Error)]
pub enum AppError {
    /// Account, notification or user management operation failed.
    #[error("{0}")]
    Account(#[from] AccountError),

    /// Session store operation failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Request body is missing, malformed or of the wrong shape.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// JSON request body extractor whose rejections render as [`AppError`], so
/// a malformed body gets the same `{"error": ...}` shape as every other
/// failure.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Account(err) => match err {
                AccountError::Validation(_) | AccountError::WeakPassword => {
                    StatusCode::BAD_REQUEST
                }
                AccountError::InvalidCredentials
                | AccountError::AccountDisabled
                | AccountError::SessionExpired => StatusCode::UNAUTHORIZED,
                AccountError::Forbidden(_) => StatusCode::FORBIDDEN,
                AccountError::NotFound => StatusCode::NOT_FOUND,
                AccountError::HandleTaken | AccountError::EmailInUse => StatusCode::CONFLICT,
                AccountError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                AccountError::Backend(_) | AccountError::Repository(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn is_server_error(&self) -> bool {
        match self {
            Self::Account(err) => err.is_server_error(),
            Self::Session(_) => true,
            Self::BadRequest(_) => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log server errors with Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Dashboard request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Account(err) => err.user_message(),
            Self::Session(_) => "Internal server error".to_string(),
            Self::BadRequest(_) => self.to_string(),
        };

        (self.status(), Json(json!({ "error": message }))).into_response()
    }
}

/// Set the Sentry user context from a profile.
pub fn set_sentry_user(uid: &UserUid, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(uid.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
