//! Handle and password sign-in.
//!
//! Users sign in with their handle; the identity provider only knows
//! emails, so the handle is resolved to the profile's email first. The
//! handle is matched as typed, then in canonical lowercase form, so both
//! legacy mixed-case handles and case-insensitive sign-in work.

use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use super::AccountError;
use crate::backend::{AuthSession, DocumentStore, IdentityProvider};
use crate::db::ProfileRepository;
use crate::models::UserProfile;

/// Sign-in service.
pub struct AuthService<'a> {
    identity: &'a dyn IdentityProvider,
    profiles: ProfileRepository<'a>,
}

impl<'a> AuthService<'a> {
    /// Create a new sign-in service.
    #[must_use]
    pub const fn new(identity: &'a dyn IdentityProvider, store: &'a dyn DocumentStore) -> Self {
        Self {
            identity,
            profiles: ProfileRepository::new(store),
        }
    }

    /// Sign in with a handle and password.
    ///
    /// An unknown or blank handle fails exactly like a wrong password.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` if the password is empty,
    /// `AccountError::InvalidCredentials` for any credential mismatch,
    /// `AccountError::RateLimited` when the provider throttles attempts, or
    /// a backend error.
    #[instrument(skip(self, password), fields(handle = %handle))]
    pub async fn login(
        &self,
        handle: &str,
        password: &SecretString,
    ) -> Result<(UserProfile, AuthSession), AccountError> {
        if password.expose_secret().is_empty() {
            return Err(AccountError::Validation("Password is required".to_string()));
        }

        let Some(profile) = self.profiles.resolve_handle(handle).await? else {
            tracing::info!("Sign-in with unknown handle");
            return Err(AccountError::InvalidCredentials);
        };

        let session = self.identity.authenticate(&profile.email, password).await?;
        if session.uid != profile.uid {
            tracing::error!(
                profile_uid = %profile.uid,
                session_uid = %session.uid,
                "Profile email belongs to a different identity"
            );
            return Err(AccountError::InvalidCredentials);
        }

        tracing::info!(uid = %profile.uid, "User signed in");
        Ok((profile, session))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stockroom_core::Email;

    use super::*;
    use crate::backend::Fields;
    use crate::backend::memory::MemoryBackend;
    use crate::models::profile::{USERS_COLLECTION, fields};

    async fn seed_user(backend: &MemoryBackend, handle: &str, password: &str) {
        let local = handle.to_lowercase().replace(' ', ".");
        let email = Email::parse(&format!("{local}@example.com")).unwrap();
        let uid = backend.seed_account(&email, password).await.unwrap();
        backend
            .seed_document(
                USERS_COLLECTION,
                uid.as_str(),
                Fields::from([
                    (fields::USERNAME.to_owned(), handle.into()),
                    (fields::EMAIL.to_owned(), email.as_str().into()),
                    (fields::ROLE.to_owned(), "staff".into()),
                ]),
            )
            .await;
    }

    #[tokio::test]
    async fn test_login_by_handle() {
        let backend = MemoryBackend::new();
        seed_user(&backend, "dana", "hunter22").await;
        let auth = AuthService::new(&backend, &backend);

        let (profile, session) = auth
            .login("Dana", &SecretString::from("hunter22"))
            .await
            .unwrap();
        assert_eq!(profile.uid, session.uid);
        assert_eq!(profile.username, "dana");
    }

    #[tokio::test]
    async fn test_login_with_legacy_handle() {
        let backend = MemoryBackend::new();
        seed_user(&backend, "Dana K", "hunter22").await;
        let auth = AuthService::new(&backend, &backend);

        let (profile, _) = auth
            .login(" Dana K ", &SecretString::from("hunter22"))
            .await
            .unwrap();
        assert_eq!(profile.username, "Dana K");
    }

    #[tokio::test]
    async fn test_unknown_handle_looks_like_wrong_password() {
        let backend = MemoryBackend::new();
        seed_user(&backend, "dana", "hunter22").await;
        let auth = AuthService::new(&backend, &backend);

        let unknown = auth
            .login("sam", &SecretString::from("hunter22"))
            .await
            .unwrap_err();
        let wrong = auth
            .login("dana", &SecretString::from("nope-nope"))
            .await
            .unwrap_err();
        assert_eq!(unknown.user_message(), wrong.user_message());
        assert!(matches!(unknown, AccountError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_blank_handle_skips_backend() {
        let backend = MemoryBackend::new();
        let auth = AuthService::new(&backend, &backend);
        let err = auth
            .login("   ", &SecretString::from("hunter22"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_password_is_a_validation_error() {
        let backend = MemoryBackend::new();
        let auth = AuthService::new(&backend, &backend);
        let err = auth
            .login("dana", &SecretString::from(""))
            .await
            .unwrap_err();
        assert!(matches!(err, AccountError::Validation(_)));
    }
}
