//! Login handle type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Handle`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    /// The input string is empty.
    #[error("handle cannot be empty")]
    Empty,
    /// The input is shorter than the minimum length.
    #[error("handle must be at least {min} characters")]
    TooShort {
        /// Minimum allowed length.
        min: usize,
    },
    /// The input is longer than the maximum length.
    #[error("handle must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[a-z0-9._-]`.
    #[error("handle cannot contain '{0}'")]
    InvalidCharacter(char),
}

/// A unique, human-chosen login name.
///
/// Handles are distinct from the identity provider's uid and are what users
/// type on the sign-in form. They are stored lowercased so uniqueness checks
/// are case-insensitive.
///
/// ```
/// use stockroom_core::Handle;
///
/// assert_eq!(Handle::parse(" Dock_Lead ").unwrap().as_str(), "dock_lead");
/// assert!(Handle::parse("no spaces").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Handle(String);

impl Handle {
    /// Minimum handle length.
    pub const MIN_LENGTH: usize = 3;
    /// Maximum handle length.
    pub const MAX_LENGTH: usize = 32;

    /// Parse and normalize a `Handle`.
    ///
    /// # Errors
    ///
    /// Returns a [`HandleError`] if the trimmed input is empty, out of the
    /// length bounds, or contains a disallowed character.
    pub fn parse(s: &str) -> Result<Self, HandleError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(HandleError::Empty);
        }

        let len = s.chars().count();
        if len < Self::MIN_LENGTH {
            return Err(HandleError::TooShort {
                min: Self::MIN_LENGTH,
            });
        }
        if len > Self::MAX_LENGTH {
            return Err(HandleError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if let Some(bad) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
        {
            return Err(HandleError::InvalidCharacter(bad));
        }

        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Returns the handle as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Handle {
    type Err = HandleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Handle {
    type Error = HandleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Handle> for String {
    fn from(handle: Handle) -> Self {
        handle.0
    }
}

impl AsRef<str> for Handle {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lowercases() {
        assert_eq!(Handle::parse("Receiving.Desk").unwrap().as_str(), "receiving.desk");
    }

    #[test]
    fn test_parse_length_bounds() {
        assert_eq!(Handle::parse(""), Err(HandleError::Empty));
        assert_eq!(Handle::parse("ab"), Err(HandleError::TooShort { min: 3 }));
        assert!(Handle::parse("abc").is_ok());
        assert!(Handle::parse(&"a".repeat(32)).is_ok());
        assert_eq!(
            Handle::parse(&"a".repeat(33)),
            Err(HandleError::TooLong { max: 32 })
        );
    }

    #[test]
    fn test_parse_rejects_invalid_characters() {
        assert_eq!(Handle::parse("dock lead"), Err(HandleError::InvalidCharacter(' ')));
        assert_eq!(Handle::parse("dock@lead"), Err(HandleError::InvalidCharacter('@')));
        assert_eq!(Handle::parse("dockläd"), Err(HandleError::InvalidCharacter('ä')));
    }

    #[test]
    fn test_serde_transparent() {
        let handle = Handle::parse("picker-7").unwrap();
        assert_eq!(serde_json::to_string(&handle).unwrap(), "\"picker-7\"");

        let bad: Result<Handle, _> = serde_json::from_str("\"x\"");
        assert!(bad.is_err());
    }
}
