//! Profile repository for the `users` collection.

use tracing::instrument;

use stockroom_core::{Email, UserRole, UserUid};

use super::RepositoryError;
use crate::backend::{Comparison, DocumentStore, FieldValue, Fields};
use crate::models::profile::{USERS_COLLECTION, UserProfile, fields};

// =============================================================================
// Document Conversion
// =============================================================================

/// Build a profile from a stored document.
///
/// The document id is authoritative for the uid. Missing `role` reads as
/// staff and a missing `name` as empty; handle and email are required. The
/// handle is kept verbatim since older documents predate the handle syntax.
///
/// # Errors
///
/// Returns `RepositoryError::DataCorruption` if a required field is missing
/// or invalid.
pub fn profile_from_fields(uid: &str, doc: &Fields) -> Result<UserProfile, RepositoryError> {
    let required = |name: &str| {
        doc.get(name).and_then(FieldValue::as_str).ok_or_else(|| {
            RepositoryError::DataCorruption(format!("profile {uid} has no string '{name}'"))
        })
    };

    let username = required(fields::USERNAME)?.to_owned();
    let email = Email::parse(required(fields::EMAIL)?).map_err(|e| {
        RepositoryError::DataCorruption(format!("invalid email in profile {uid}: {e}"))
    })?;
    let role = match doc.get(fields::ROLE).and_then(FieldValue::as_str) {
        Some(role) => role
            .parse::<UserRole>()
            .map_err(|e| RepositoryError::DataCorruption(format!("profile {uid}: {e}")))?,
        None => UserRole::default(),
    };

    Ok(UserProfile {
        uid: UserUid::new(uid),
        username,
        email,
        role,
        name: doc
            .get(fields::NAME)
            .and_then(FieldValue::as_str)
            .unwrap_or_default()
            .to_owned(),
        created_at: doc.get(fields::CREATED_AT).and_then(FieldValue::as_timestamp),
        created_by: doc
            .get(fields::CREATED_BY)
            .and_then(FieldValue::as_str)
            .map(str::to_owned),
    })
}

/// A profile about to be written for the first time.
#[derive(Debug, Clone)]
pub struct NewProfile<'a> {
    pub uid: &'a UserUid,
    pub username: &'a str,
    pub email: &'a Email,
    pub role: UserRole,
    pub name: &'a str,
    pub created_by: &'a str,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for profile documents.
pub struct ProfileRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> ProfileRepository<'a> {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Get a profile by uid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the read fails.
    /// Returns `RepositoryError::DataCorruption` if the document is invalid.
    #[instrument(skip(self), fields(uid = %uid))]
    pub async fn get(&self, uid: &UserUid) -> Result<Option<UserProfile>, RepositoryError> {
        self.store
            .get_document(USERS_COLLECTION, uid.as_str())
            .await?
            .map(|doc| profile_from_fields(uid.as_str(), &doc))
            .transpose()
    }

    /// Find the profile whose stored handle is exactly `handle`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the document is invalid.
    #[instrument(skip(self), fields(handle = %handle))]
    pub async fn lookup_by_handle(
        &self,
        handle: &str,
    ) -> Result<Option<UserProfile>, RepositoryError> {
        let mut docs = self
            .store
            .query_where(
                USERS_COLLECTION,
                fields::USERNAME,
                Comparison::Equal,
                FieldValue::from(handle),
            )
            .await?;

        if docs.len() > 1 {
            tracing::warn!(count = docs.len(), "Handle is shared by several profiles");
            docs.sort_by(|a, b| a.id.cmp(&b.id));
        }

        docs.first()
            .map(|doc| profile_from_fields(&doc.id, &doc.fields))
            .transpose()
    }

    /// Find the profile a typed handle refers to: the trimmed input as typed,
    /// then its canonical lowercase form.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if the document is invalid.
    pub async fn resolve_handle(&self, typed: &str) -> Result<Option<UserProfile>, RepositoryError> {
        let typed = typed.trim();
        if typed.is_empty() {
            return Ok(None);
        }
        if let Some(profile) = self.lookup_by_handle(typed).await? {
            return Ok(Some(profile));
        }
        let lowered = typed.to_lowercase();
        if lowered == typed {
            return Ok(None);
        }
        self.lookup_by_handle(&lowered).await
    }

    /// Write a new profile, replacing any stale document with the same uid.
    ///
    /// `createdAt` is set to the store's clock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the write fails.
    #[instrument(skip(self, profile), fields(uid = %profile.uid, handle = %profile.username))]
    pub async fn create(&self, profile: &NewProfile<'_>) -> Result<(), RepositoryError> {
        let doc = Fields::from([
            (fields::UID.to_owned(), profile.uid.as_str().into()),
            (fields::USERNAME.to_owned(), profile.username.into()),
            (fields::EMAIL.to_owned(), profile.email.as_str().into()),
            (fields::ROLE.to_owned(), profile.role.as_str().into()),
            (fields::NAME.to_owned(), profile.name.into()),
            (fields::CREATED_AT.to_owned(), FieldValue::ServerTimestamp),
            (fields::CREATED_BY.to_owned(), profile.created_by.into()),
        ]);
        self.store
            .set_document(USERS_COLLECTION, profile.uid.as_str(), doc, false)
            .await?;
        Ok(())
    }

    /// Update the user-editable fields, leaving role and audit fields intact.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the write fails.
    #[instrument(skip(self, name), fields(uid = %uid))]
    pub async fn update_details(
        &self,
        uid: &UserUid,
        username: &str,
        name: &str,
        email: &Email,
    ) -> Result<(), RepositoryError> {
        let doc = Fields::from([
            (fields::USERNAME.to_owned(), username.into()),
            (fields::NAME.to_owned(), name.into()),
            (fields::EMAIL.to_owned(), email.as_str().into()),
        ]);
        self.store
            .set_document(USERS_COLLECTION, uid.as_str(), doc, true)
            .await?;
        Ok(())
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the write fails.
    #[instrument(skip(self), fields(uid = %uid, role = %role))]
    pub async fn set_role(&self, uid: &UserUid, role: UserRole) -> Result<(), RepositoryError> {
        let doc = Fields::from([(fields::ROLE.to_owned(), role.as_str().into())]);
        self.store
            .set_document(USERS_COLLECTION, uid.as_str(), doc, true)
            .await?;
        Ok(())
    }

    /// Delete a profile document. The identity account is left alone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the delete fails.
    #[instrument(skip(self), fields(uid = %uid))]
    pub async fn delete(&self, uid: &UserUid) -> Result<(), RepositoryError> {
        self.store
            .delete_document(USERS_COLLECTION, uid.as_str())
            .await?;
        Ok(())
    }

    /// List all profiles, oldest first.
    ///
    /// Documents that fail to decode are skipped and logged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<UserProfile>, RepositoryError> {
        let docs = self.store.list_documents(USERS_COLLECTION).await?;

        let mut profiles: Vec<UserProfile> = docs
            .iter()
            .filter_map(|doc| match profile_from_fields(&doc.id, &doc.fields) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    tracing::warn!(uid = %doc.id, error = %e, "Skipping unreadable profile");
                    None
                }
            })
            .collect();

        profiles.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.username.cmp(&b.username))
        });
        Ok(profiles)
    }

    /// Returns `true` if at least one profile has the admin role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the query fails.
    #[instrument(skip(self))]
    pub async fn any_admin(&self) -> Result<bool, RepositoryError> {
        let admins = self
            .store
            .query_where(
                USERS_COLLECTION,
                fields::ROLE,
                Comparison::Equal,
                UserRole::Admin.as_str().into(),
            )
            .await?;
        Ok(!admins.is_empty())
    }
}
