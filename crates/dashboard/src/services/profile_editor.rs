//! Profile editing with re-authentication.
//!
//! A save runs in a fixed order: local validation (no network), handle
//! uniqueness, re-authentication plus credential updates when the email or
//! password changes, and finally the profile document merge.
//!
//! Sign-in resolves the handle to the profile's email, so the profile email
//! and the identity email must never drift apart. When a later step fails,
//! credential changes already applied are reverted before the error is
//! returned.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use stockroom_core::{Email, Handle};

use super::AccountError;
use crate::backend::{AuthSession, DocumentStore, IdentityProvider};
use crate::db::ProfileRepository;
use crate::models::UserProfile;

/// Minimum password length accepted by the identity provider.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum display name length.
pub const MAX_NAME_LENGTH: usize = 100;

/// Submitted profile form. Password fields are empty when unused.
#[derive(Default, Deserialize)]
pub struct ProfileForm {
    pub username: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

impl std::fmt::Debug for ProfileForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileForm")
            .field("username", &self.username)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("current_password", &"[REDACTED]")
            .field("new_password", &"[REDACTED]")
            .field("confirm_password", &"[REDACTED]")
            .finish()
    }
}

/// A validated profile form.
#[derive(Debug)]
pub struct ProfileChanges {
    pub username: String,
    pub name: String,
    pub email: Email,
    pub current_password: Option<SecretString>,
    pub new_password: Option<SecretString>,
}

impl ProfileChanges {
    /// Validate a form against the profile it edits. Makes no backend calls.
    ///
    /// A handle left as stored is kept verbatim; only a new handle has to
    /// satisfy the handle syntax.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` describing the first problem found.
    pub fn validate(form: ProfileForm, current: &UserProfile) -> Result<Self, AccountError> {
        let username = if form.username.trim() == current.username {
            current.username.clone()
        } else {
            Handle::parse(&form.username)?.to_string()
        };
        let name = validate_display_name(&form.name)?;
        let email = Email::parse(&form.email)?;

        if form.new_password != form.confirm_password {
            return Err(AccountError::Validation(
                "New password and confirmation do not match".to_string(),
            ));
        }
        let new_password = non_empty_secret(form.new_password);
        if let Some(password) = &new_password {
            validate_new_password(password)?;
        }

        let changes = Self {
            username,
            name,
            email,
            current_password: non_empty_secret(form.current_password),
            new_password,
        };

        if changes.needs_reauthentication(current) && changes.current_password.is_none() {
            return Err(AccountError::Validation(
                "Enter your current password to change your email or password".to_string(),
            ));
        }
        Ok(changes)
    }

    /// Returns `true` if the sign-in email differs from the stored one.
    #[must_use]
    pub fn email_changed(&self, current: &UserProfile) -> bool {
        self.email != current.email
    }

    /// Returns `true` if applying these changes touches identity credentials.
    #[must_use]
    pub fn needs_reauthentication(&self, current: &UserProfile) -> bool {
        self.email_changed(current) || self.new_password.is_some()
    }
}

/// Validate and normalize a display name.
///
/// # Errors
///
/// Returns `AccountError::Validation` for a blank or overlong name.
pub fn validate_display_name(raw: &str) -> Result<String, AccountError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AccountError::Validation("Name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AccountError::Validation(format!(
            "Name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(name.to_string())
}

/// Check a new password against the provider's minimum length.
///
/// # Errors
///
/// Returns `AccountError::Validation` if the password is too short.
pub fn validate_new_password(password: &SecretString) -> Result<(), AccountError> {
    if password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AccountError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn non_empty_secret(value: String) -> Option<SecretString> {
    (!value.is_empty()).then(|| SecretString::from(value))
}

/// Result of a successful save.
#[derive(Debug)]
pub struct ProfileSaveOutcome {
    /// The profile as now stored.
    pub profile: UserProfile,
    /// Fresh provider session when credentials were re-authenticated; the
    /// caller replaces the stored session with it.
    pub session: Option<AuthSession>,
}

/// Applies profile edits for the signed-in user.
pub struct ProfileEditor<'a> {
    identity: &'a dyn IdentityProvider,
    profiles: ProfileRepository<'a>,
}

impl<'a> ProfileEditor<'a> {
    /// Create a new profile editor.
    #[must_use]
    pub const fn new(identity: &'a dyn IdentityProvider, store: &'a dyn DocumentStore) -> Self {
        Self {
            identity,
            profiles: ProfileRepository::new(store),
        }
    }

    /// Validate and apply a profile form.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Validation` for bad input or a wrong current
    /// password, `AccountError::HandleTaken` / `AccountError::EmailInUse`
    /// for conflicts, or a backend error.
    #[instrument(skip(self, current, form), fields(uid = %current.uid))]
    pub async fn save(
        &self,
        current: &UserProfile,
        form: ProfileForm,
    ) -> Result<ProfileSaveOutcome, AccountError> {
        let changes = ProfileChanges::validate(form, current)?;

        if changes.username != current.username {
            let owner = self.profiles.lookup_by_handle(&changes.username).await?;
            if owner.is_some_and(|owner| owner.uid != current.uid) {
                return Err(AccountError::HandleTaken);
            }
        }

        let session = match &changes.current_password {
            Some(password) if changes.needs_reauthentication(current) => Some(
                self.reauthenticate_and_update(current, &changes, password)
                    .await?,
            ),
            _ => None,
        };

        if let Err(e) = self
            .profiles
            .update_details(
                &current.uid,
                &changes.username,
                &changes.name,
                &changes.email,
            )
            .await
        {
            if let (Some(session), Some(password)) = (&session, &changes.current_password) {
                tracing::error!(error = %e, "Profile write failed; restoring credentials");
                self.restore_credentials(session, current, &changes, password)
                    .await;
            }
            return Err(e.into());
        }

        tracing::info!(reauthenticated = session.is_some(), "Profile updated");

        Ok(ProfileSaveOutcome {
            profile: UserProfile {
                username: changes.username,
                name: changes.name,
                email: changes.email,
                ..current.clone()
            },
            session,
        })
    }

    async fn reauthenticate_and_update(
        &self,
        current: &UserProfile,
        changes: &ProfileChanges,
        current_password: &SecretString,
    ) -> Result<AuthSession, AccountError> {
        let mut session = self
            .identity
            .authenticate(&current.email, current_password)
            .await
            .map_err(|e| match AccountError::from(e) {
                AccountError::InvalidCredentials => {
                    AccountError::Validation("Current password is incorrect".to_string())
                }
                other => other,
            })?;

        if changes.email_changed(current) {
            session = self.identity.update_email(&session, &changes.email).await?;
        }
        if let Some(password) = &changes.new_password {
            match self.identity.update_password(&session, password).await {
                Ok(next) => session = next,
                Err(e) => {
                    if changes.email_changed(current) {
                        self.restore_email(&session, current).await;
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(session)
    }

    /// Put back the email and password the profile was saved with.
    async fn restore_credentials(
        &self,
        session: &AuthSession,
        current: &UserProfile,
        changes: &ProfileChanges,
        current_password: &SecretString,
    ) {
        let mut session = session.clone();
        if changes.new_password.is_some() {
            match self
                .identity
                .update_password(&session, current_password)
                .await
            {
                Ok(next) => session = next,
                Err(e) => tracing::error!(error = %e, "Failed to restore previous password"),
            }
        }
        if changes.email_changed(current) {
            self.restore_email(&session, current).await;
        }
    }

    async fn restore_email(&self, session: &AuthSession, current: &UserProfile) {
        match self.identity.update_email(session, &current.email).await {
            Ok(_) => tracing::info!("Restored previous sign-in email"),
            Err(e) => tracing::error!(
                error = %e,
                email = %current.email,
                "Failed to restore sign-in email; identity and profile disagree"
            ),
        }
    }
}
