//! Document collection names.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`CollectionName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectionNameError {
    /// The input string is empty.
    #[error("collection name cannot be empty")]
    Empty,
    /// The input is longer than the store allows.
    #[error("collection name must be at most {max} bytes")]
    TooLong {
        /// Maximum allowed length in bytes.
        max: usize,
    },
    /// The input contains a path separator.
    #[error("collection name cannot contain '/'")]
    ContainsSlash,
    /// The input is `.`, `..` or matches the reserved `__name__` form.
    #[error("collection name '{0}' is reserved")]
    Reserved(String),
}

/// Name of a top-level document collection.
///
/// Tracked collections double as field names in the per-user view-state
/// record, so the same rules apply to both uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionName(String);

impl CollectionName {
    /// Maximum collection id length accepted by the document store.
    pub const MAX_LENGTH: usize = 1500;

    /// Parse a `CollectionName`.
    ///
    /// # Errors
    ///
    /// Returns a [`CollectionNameError`] for empty, oversized, slash-containing
    /// or reserved names.
    pub fn parse(s: &str) -> Result<Self, CollectionNameError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(CollectionNameError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(CollectionNameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if s.contains('/') {
            return Err(CollectionNameError::ContainsSlash);
        }
        if s == "." || s == ".." || (s.len() >= 4 && s.starts_with("__") && s.ends_with("__")) {
            return Err(CollectionNameError::Reserved(s.to_owned()));
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the collection name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CollectionName {
    type Err = CollectionNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CollectionName {
    type Error = CollectionNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CollectionName> for String {
    fn from(name: CollectionName) -> Self {
        name.0
    }
}

impl AsRef<str> for CollectionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
