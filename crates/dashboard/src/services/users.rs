//! Administrative user management.
//!
//! Only admins create users, change roles and remove profiles. Removing a
//! profile leaves the identity account in place; without a profile the
//! session gate turns that identity away. The very first admin comes from
//! [`UserAdminService::bootstrap_admin`], which refuses once any admin exists.

use secrecy::SecretString;
use serde::Deserialize;
use tracing::instrument;

use stockroom_core::{Email, Handle, UserRole, UserUid};

use super::AccountError;
use super::profile_editor::{validate_display_name, validate_new_password};
use crate::backend::{DocumentStore, IdentityProvider};
use crate::db::ProfileRepository;
use crate::db::profiles::NewProfile;
use crate::models::UserProfile;
use crate::models::profile::BOOTSTRAP_CREATOR;

/// Form for creating a user.
#[derive(Deserialize)]
pub struct NewUserForm {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

impl std::fmt::Debug for NewUserForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUserForm")
            .field("username", &self.username)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("role", &self.role)
            .finish()
    }
}

struct ValidatedUser {
    username: Handle,
    name: String,
    email: Email,
    password: SecretString,
}

impl NewUserForm {
    fn validate(self) -> Result<ValidatedUser, AccountError> {
        let username = Handle::parse(&self.username)?;
        let name = validate_display_name(&self.name)?;
        let email = Email::parse(&self.email)?;
        let password = SecretString::from(self.password);
        validate_new_password(&password)?;
        Ok(ValidatedUser {
            username,
            name,
            email,
            password,
        })
    }
}

/// User administration service.
pub struct UserAdminService<'a> {
    identity: &'a dyn IdentityProvider,
    profiles: ProfileRepository<'a>,
}

impl<'a> UserAdminService<'a> {
    /// Create a new user administration service.
    #[must_use]
    pub const fn new(identity: &'a dyn IdentityProvider, store: &'a dyn DocumentStore) -> Self {
        Self {
            identity,
            profiles: ProfileRepository::new(store),
        }
    }

    /// List every profile, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Forbidden` for non-admins, or a backend error.
    #[instrument(skip(self, admin), fields(admin = %admin.uid))]
    pub async fn list_users(&self, admin: &UserProfile) -> Result<Vec<UserProfile>, AccountError> {
        require_admin(admin)?;
        Ok(self.profiles.list_all().await?)
    }

    /// Create an identity account and its profile.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Forbidden` for non-admins,
    /// `AccountError::Validation` for bad input, `AccountError::HandleTaken`
    /// or `AccountError::EmailInUse` for conflicts, or a backend error.
    #[instrument(skip(self, admin, form), fields(admin = %admin.uid, handle = %form.username))]
    pub async fn create_user(
        &self,
        admin: &UserProfile,
        form: NewUserForm,
    ) -> Result<UserProfile, AccountError> {
        require_admin(admin)?;
        let role = form.role;
        self.create(form.validate()?, role, admin.uid.as_str()).await
    }

    /// Create the first admin.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Forbidden` once any admin exists, otherwise as
    /// for [`create_user`](Self::create_user).
    #[instrument(skip(self, form), fields(handle = %form.username))]
    pub async fn bootstrap_admin(&self, form: NewUserForm) -> Result<UserProfile, AccountError> {
        let user = form.validate()?;
        if self.profiles.any_admin().await? {
            return Err(AccountError::Forbidden(
                "An administrator already exists".to_string(),
            ));
        }
        self.create(user, UserRole::Admin, BOOTSTRAP_CREATOR).await
    }

    /// Change another user's role.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Forbidden` for non-admins or self-demotion,
    /// `AccountError::NotFound` for an unknown uid, or a backend error.
    #[instrument(skip(self, admin), fields(admin = %admin.uid, target = %uid, role = %role))]
    pub async fn set_role(
        &self,
        admin: &UserProfile,
        uid: &UserUid,
        role: UserRole,
    ) -> Result<UserProfile, AccountError> {
        require_admin(admin)?;
        if *uid == admin.uid && !role.is_admin() {
            return Err(AccountError::Forbidden(
                "You cannot remove your own admin role".to_string(),
            ));
        }

        let target = self.profiles.get(uid).await?.ok_or(AccountError::NotFound)?;
        if target.role != role {
            self.profiles.set_role(uid, role).await?;
            tracing::info!(from = %target.role, "Role changed");
        }
        Ok(UserProfile { role, ..target })
    }

    /// Remove a user's profile. The identity account is kept.
    ///
    /// # Errors
    ///
    /// Returns `AccountError::Forbidden` for non-admins or self-deletion,
    /// `AccountError::NotFound` for an unknown uid, or a backend error.
    #[instrument(skip(self, admin), fields(admin = %admin.uid, target = %uid))]
    pub async fn delete_profile(
        &self,
        admin: &UserProfile,
        uid: &UserUid,
    ) -> Result<(), AccountError> {
        require_admin(admin)?;
        if *uid == admin.uid {
            return Err(AccountError::Forbidden(
                "You cannot delete your own profile".to_string(),
            ));
        }

        if self.profiles.get(uid).await?.is_none() {
            return Err(AccountError::NotFound);
        }
        self.profiles.delete(uid).await?;
        tracing::info!("Profile deleted");
        Ok(())
    }

    async fn create(
        &self,
        user: ValidatedUser,
        role: UserRole,
        created_by: &str,
    ) -> Result<UserProfile, AccountError> {
        if self.profiles.lookup_by_handle(user.username.as_str()).await?.is_some() {
            return Err(AccountError::HandleTaken);
        }

        let uid = self
            .identity
            .create_account(&user.email, &user.password)
            .await?;

        self.profiles
            .create(&NewProfile {
                uid: &uid,
                username: user.username.as_str(),
                email: &user.email,
                role,
                name: &user.name,
                created_by,
            })
            .await?;
        tracing::info!(uid = %uid, role = %role, "User created");

        self.profiles.get(&uid).await?.ok_or(AccountError::NotFound)
    }
}

fn require_admin(profile: &UserProfile) -> Result<(), AccountError> {
    if profile.is_admin() {
        Ok(())
    } else {
        Err(AccountError::Forbidden(
            "Administrator access required".to_string(),
        ))
    }
}
