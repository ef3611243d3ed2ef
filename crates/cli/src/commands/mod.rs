//! CLI command implementations.
//!
//! # Environment Variables
//!
//! - `DASHBOARD_BACKEND` - `rest` (default) or `memory`
//! - `BACKEND_API_KEY`, `BACKEND_PROJECT_ID` - REST backend credentials
//! - `DASHBOARD_TRACKED_COLLECTIONS` - collections for `counts`
//! - `SR_USER_PASSWORD` - initial password for `bootstrap` and `users create`
//!
//! With the `memory` backend every invocation starts empty, so only
//! `bootstrap` is meaningful there.

use thiserror::Error;

use stockroom_dashboard::backend::{self, BackendError, Backends};
use stockroom_dashboard::config::{BackendConfig, ConfigError};
use stockroom_dashboard::db::{ProfileRepository, RepositoryError};
use stockroom_dashboard::models::UserProfile;
use stockroom_dashboard::services::AccountError;

pub mod counts;
pub mod users;

/// Environment variable holding the password for new accounts.
pub const PASSWORD_ENV_VAR: &str = "SR_USER_PASSWORD";

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend client could not be built.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Profile lookup failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Service operation was refused or failed.
    #[error("{}", .0.user_message())]
    Account(#[from] AccountError),

    /// No profile has the given handle.
    #[error("No user with handle: {0}")]
    UnknownUser(String),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: admin, staff")]
    InvalidRole(String),
}

/// Backend handles shared by every command.
pub struct Context {
    pub backends: Backends,
}

impl Context {
    /// Connect to the backend named by the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is missing or invalid.
    pub fn from_env() -> Result<Self, CliError> {
        dotenvy::dotenv().ok();
        let config = BackendConfig::from_env()?;
        Ok(Self {
            backends: backend::connect(&config)?,
        })
    }

    /// Find the profile with `handle`, matched the way sign-in matches it.
    ///
    /// # Errors
    ///
    /// Returns `CliError::UnknownUser` if no profile has the handle.
    pub async fn profile(&self, handle: &str) -> Result<UserProfile, CliError> {
        ProfileRepository::new(self.backends.store.as_ref())
            .resolve_handle(handle)
            .await?
            .ok_or_else(|| CliError::UnknownUser(handle.trim().to_owned()))
    }
}

/// Read the new-account password from the environment.
///
/// # Errors
///
/// Returns `CliError::MissingEnvVar` if the variable is unset or empty.
pub fn password_from_env() -> Result<String, CliError> {
    std::env::var(PASSWORD_ENV_VAR)
        .ok()
        .filter(|p| !p.is_empty())
        .ok_or(CliError::MissingEnvVar(PASSWORD_ENV_VAR))
}
