//! Identity references.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Identity-provider user reference (the provider's `localId`).
///
/// Opaque to this workspace: it keys the profile and view-state documents
/// and is never shown as a login name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserUid(String);

impl UserUid {
    /// Wrap a provider-issued uid.
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// Returns the uid as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for UserUid {
    fn from(uid: String) -> Self {
        Self(uid)
    }
}

impl From<&str> for UserUid {
    fn from(uid: &str) -> Self {
        Self(uid.to_owned())
    }
}

impl AsRef<str> for UserUid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
