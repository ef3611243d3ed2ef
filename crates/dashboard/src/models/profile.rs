//! User profile domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use stockroom_core::{Email, UserRole, UserUid};

/// Collection holding one profile document per identity, keyed by uid.
pub const USERS_COLLECTION: &str = "users";

/// `createdBy` value for the profile written by the one-time bootstrap.
pub const BOOTSTRAP_CREATOR: &str = "bootstrap";

/// Field names of a profile document.
pub mod fields {
    pub const UID: &str = "uid";
    pub const USERNAME: &str = "username";
    pub const EMAIL: &str = "email";
    pub const ROLE: &str = "role";
    pub const NAME: &str = "name";
    pub const CREATED_AT: &str = "createdAt";
    pub const CREATED_BY: &str = "createdBy";
}

/// Application-level user record.
///
/// Distinct from the identity provider's credential record: the provider
/// owns the password, this document owns the handle, display name and role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Identity uid; also the document id.
    pub uid: UserUid,
    /// Unique login handle, exactly as stored. Only handles chosen through
    /// this service are guaranteed to be in canonical lowercase form.
    pub username: String,
    /// Sign-in email, mirrored from the identity provider.
    pub email: Email,
    /// Permission level.
    pub role: UserRole,
    /// Display name.
    pub name: String,
    /// When the profile was created. Absent on legacy documents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Uid of the creating admin, or [`BOOTSTRAP_CREATOR`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl UserProfile {
    /// Returns `true` if this user is an administrator.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
