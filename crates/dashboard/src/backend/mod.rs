//! Managed identity and document backend.
//!
//! The dashboard never verifies passwords or executes queries itself; both
//! are delegated to a hosted backend-as-a-service. This module defines the
//! two seams the rest of the crate talks to:
//!
//! - [`IdentityProvider`] - sign-in, session token verification, credential changes
//! - [`DocumentStore`] - profile, view-state and tracked-collection documents
//!
//! # Implementations
//!
//! - [`rest::RestBackend`] - Firebase-compatible REST client (production)
//! - [`memory::MemoryBackend`] - in-process backend for local development and tests

pub mod memory;
pub mod rest;
pub mod value;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockroom_core::{Email, UserUid};

use crate::config::BackendConfig;

pub use value::{Document, FieldValue, Fields};

/// Errors returned by backend implementations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The provider rejected the request with a known error code.
    #[error("provider rejected request: {0}")]
    Provider(ProviderCode),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with an unexpected status.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The response parsed but did not have the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// The backend is misconfigured (bad base URL, missing project).
    #[error("backend configuration error: {0}")]
    Config(String),
}

/// Error codes reported by the identity provider.
///
/// The provider reports failures as `"CODE"` or `"CODE : detail"` in the
/// error message; only the code is significant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCode {
    EmailNotFound,
    InvalidPassword,
    InvalidLoginCredentials,
    UserDisabled,
    TooManyAttempts,
    EmailExists,
    WeakPassword,
    InvalidIdToken,
    TokenExpired,
    InvalidRefreshToken,
    CredentialTooOld,
    Other(String),
}

impl ProviderCode {
    /// Returns `true` if the code means the ID token is no longer usable but
    /// the session may be renewed with its refresh token.
    #[must_use]
    pub const fn is_stale_token(&self) -> bool {
        matches!(self, Self::InvalidIdToken | Self::TokenExpired)
    }

    /// Parse a provider error message.
    #[must_use]
    pub fn parse(message: &str) -> Self {
        let code = message.split(':').next().unwrap_or_default().trim();
        match code {
            "EMAIL_NOT_FOUND" => Self::EmailNotFound,
            "INVALID_PASSWORD" => Self::InvalidPassword,
            "INVALID_LOGIN_CREDENTIALS" => Self::InvalidLoginCredentials,
            "USER_DISABLED" => Self::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyAttempts,
            "EMAIL_EXISTS" => Self::EmailExists,
            "WEAK_PASSWORD" => Self::WeakPassword,
            "INVALID_ID_TOKEN" | "USER_NOT_FOUND" => Self::InvalidIdToken,
            "TOKEN_EXPIRED" => Self::TokenExpired,
            "INVALID_REFRESH_TOKEN" => Self::InvalidRefreshToken,
            "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => Self::CredentialTooOld,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The wire form of the code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::EmailNotFound => "EMAIL_NOT_FOUND",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::InvalidLoginCredentials => "INVALID_LOGIN_CREDENTIALS",
            Self::UserDisabled => "USER_DISABLED",
            Self::TooManyAttempts => "TOO_MANY_ATTEMPTS_TRY_LATER",
            Self::EmailExists => "EMAIL_EXISTS",
            Self::WeakPassword => "WEAK_PASSWORD",
            Self::InvalidIdToken => "INVALID_ID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::InvalidRefreshToken => "INVALID_REFRESH_TOKEN",
            Self::CredentialTooOld => "CREDENTIAL_TOO_OLD_LOGIN_AGAIN",
            Self::Other(code) => code,
        }
    }
}

impl BackendError {
    /// Returns `true` if the provider rejected an ID token as stale.
    #[must_use]
    pub const fn is_stale_token(&self) -> bool {
        matches!(self, Self::Provider(code) if code.is_stale_token())
    }
}

impl fmt::Display for ProviderCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-issued session token (an ID token).
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for sending to the provider.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken([REDACTED])")
    }
}

/// A signed-in provider session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Identity the session belongs to.
    pub uid: UserUid,
    /// Token presented to the provider on later requests.
    pub id_token: SessionToken,
    /// Token used to mint a new ID token, when the provider issues one.
    pub refresh_token: Option<SessionToken>,
}

/// Comparison operators supported by [`DocumentStore::query_where`] and
/// [`DocumentStore::count_where`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    GreaterThan,
}

/// Identity provider operations.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Sign in with email and password.
    async fn authenticate(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError>;

    /// Verify a session token and return the identity it belongs to.
    async fn resolve_session(&self, token: &SessionToken) -> Result<UserUid, BackendError>;

    /// Exchange the session's refresh token for a new ID token.
    ///
    /// Fails with `ProviderCode::InvalidRefreshToken` when the session has
    /// no refresh token or the provider no longer honours it.
    async fn refresh_session(&self, session: &AuthSession) -> Result<AuthSession, BackendError>;

    /// Change the sign-in email of a freshly authenticated session.
    async fn update_email(
        &self,
        session: &AuthSession,
        email: &Email,
    ) -> Result<AuthSession, BackendError>;

    /// Change the password of a freshly authenticated session.
    async fn update_password(
        &self,
        session: &AuthSession,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError>;

    /// Create a new identity account.
    async fn create_account(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<UserUid, BackendError>;
}

/// Document store operations.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document's fields, or `None` if it does not exist.
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Fields>, BackendError>;

    /// Write a document.
    ///
    /// With `merge`, only the given fields are written and every other field
    /// of an existing document is kept; without it the document is replaced.
    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        merge: bool,
    ) -> Result<(), BackendError>;

    /// Delete a document. Deleting a missing document is not an error.
    async fn delete_document(&self, collection: &str, id: &str) -> Result<(), BackendError>;

    /// Return every document in `collection` whose `field` compares to `value`.
    async fn query_where(
        &self,
        collection: &str,
        field: &str,
        op: Comparison,
        value: FieldValue,
    ) -> Result<Vec<Document>, BackendError>;

    /// Count the documents in `collection` whose `field` compares to
    /// `value`, without fetching them.
    async fn count_where(
        &self,
        collection: &str,
        field: &str,
        op: Comparison,
        value: FieldValue,
    ) -> Result<usize, BackendError>;

    /// Return every document in `collection`.
    async fn list_documents(&self, collection: &str) -> Result<Vec<Document>, BackendError>;
}

/// Backend handles shared by the application state and the CLI.
#[derive(Clone)]
pub struct Backends {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn DocumentStore>,
}

/// Build the backend selected by configuration.
///
/// # Errors
///
/// Returns `BackendError::Config` or `BackendError::Http` if the REST client
/// cannot be constructed.
pub fn connect(config: &BackendConfig) -> Result<Backends, BackendError> {
    match config {
        BackendConfig::Rest(rest_config) => {
            let backend = rest::RestBackend::new(rest_config.clone())?;
            tracing::info!(project = %rest_config.project_id, "Using REST backend");
            Ok(Backends {
                identity: Arc::new(backend.clone()),
                store: Arc::new(backend),
            })
        }
        BackendConfig::Memory => {
            tracing::warn!("Using in-memory backend; data is lost on restart");
            let backend = memory::MemoryBackend::new();
            Ok(Backends {
                identity: Arc::new(backend.clone()),
                store: Arc::new(backend),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_code_strips_detail() {
        assert_eq!(
            ProviderCode::parse("WEAK_PASSWORD : Password should be at least 6 characters"),
            ProviderCode::WeakPassword
        );
        assert_eq!(
            ProviderCode::parse("TOO_MANY_ATTEMPTS_TRY_LATER"),
            ProviderCode::TooManyAttempts
        );
    }

    #[test]
    fn test_provider_code_keeps_unknown_codes() {
        let code = ProviderCode::parse("OPERATION_NOT_ALLOWED");
        assert_eq!(code, ProviderCode::Other("OPERATION_NOT_ALLOWED".to_owned()));
        assert_eq!(code.to_string(), "OPERATION_NOT_ALLOWED");
    }

    #[test]
    fn test_only_id_token_rejections_are_stale() {
        assert!(BackendError::Provider(ProviderCode::TokenExpired).is_stale_token());
        assert!(BackendError::Provider(ProviderCode::parse("USER_NOT_FOUND")).is_stale_token());
        assert!(!BackendError::Provider(ProviderCode::InvalidRefreshToken).is_stale_token());
        assert!(!BackendError::Decode("x".to_owned()).is_stale_token());
    }

    #[test]
    fn test_session_token_debug_redacts() {
        let token = SessionToken::new("eyJhbGciOiJSUzI1NiJ9.secret");
        let debug = format!("{token:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret"));
    }
}
