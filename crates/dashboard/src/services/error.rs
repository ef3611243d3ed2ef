//! Account operation error types.

use thiserror::Error;

use stockroom_core::{CollectionNameError, EmailError, HandleError};

use crate::backend::{BackendError, ProviderCode};
use crate::db::RepositoryError;

/// Errors from sign-in, profile editing and user administration.
#[derive(Debug, Error)]
pub enum AccountError {
    /// Unknown handle, unknown email or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The provider is throttling sign-in attempts.
    #[error("too many attempts")]
    RateLimited,

    /// The identity account is disabled.
    #[error("account disabled")]
    AccountDisabled,

    /// The provider session is no longer accepted.
    #[error("session expired")]
    SessionExpired,

    /// The caller may not perform this action.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The target profile does not exist.
    #[error("not found")]
    NotFound,

    /// Malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Another profile already uses the handle.
    #[error("handle already taken")]
    HandleTaken,

    /// Another identity account already uses the email.
    #[error("email already in use")]
    EmailInUse,

    /// The provider rejected the new password.
    #[error("password too weak")]
    WeakPassword,

    /// Backend call failed.
    #[error("backend error: {0}")]
    Backend(BackendError),

    /// Stored data could not be read or written.
    #[error("repository error: {0}")]
    Repository(RepositoryError),
}

impl AccountError {
    /// Message safe to show to the signed-in user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredentials => "Invalid handle or password".to_string(),
            Self::RateLimited => {
                "Too many attempts. Please wait a moment and try again".to_string()
            }
            Self::AccountDisabled => "This account has been disabled".to_string(),
            Self::SessionExpired => "Your session has expired. Please sign in again".to_string(),
            Self::Forbidden(reason) => reason.clone(),
            Self::NotFound => "User not found".to_string(),
            Self::Validation(msg) => msg.clone(),
            Self::HandleTaken => "That username is already taken".to_string(),
            Self::EmailInUse => "That email is already in use".to_string(),
            Self::WeakPassword => "Password must be at least 6 characters".to_string(),
            Self::Backend(_) | Self::Repository(_) => {
                "The account service is unavailable. Please try again".to_string()
            }
        }
    }

    /// Returns `true` for failures on our side or the backend's, as opposed
    /// to a rejected request.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Repository(_))
    }
}

impl From<BackendError> for AccountError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Provider(code) => match code {
                ProviderCode::EmailNotFound
                | ProviderCode::InvalidPassword
                | ProviderCode::InvalidLoginCredentials => Self::InvalidCredentials,
                ProviderCode::TooManyAttempts => Self::RateLimited,
                ProviderCode::UserDisabled => Self::AccountDisabled,
                ProviderCode::EmailExists => Self::EmailInUse,
                ProviderCode::WeakPassword => Self::WeakPassword,
                ProviderCode::InvalidIdToken
                | ProviderCode::TokenExpired
                | ProviderCode::CredentialTooOld => Self::SessionExpired,
                ProviderCode::Other(_) => Self::Backend(BackendError::Provider(code)),
            },
            other => Self::Backend(other),
        }
    }
}

impl From<RepositoryError> for AccountError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Backend(e) => e.into(),
            other @ RepositoryError::DataCorruption(_) => Self::Repository(other),
        }
    }
}

impl From<EmailError> for AccountError {
    fn from(err: EmailError) -> Self {
        Self::Validation(format!("Invalid email: {err}"))
    }
}

impl From<HandleError> for AccountError {
    fn from(err: HandleError) -> Self {
        Self::Validation(format!("Invalid username: {err}"))
    }
}

impl From<CollectionNameError> for AccountError {
    fn from(err: CollectionNameError) -> Self {
        Self::Validation(format!("Invalid collection: {err}"))
    }
}
