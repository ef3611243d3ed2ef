//! Dashboard roles.

use serde::{Deserialize, Serialize};

/// Dashboard role with different permission levels.
///
/// Stored verbatim in the profile document's `role` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Manages other users (create, change role, remove profile).
    Admin,
    /// Regular dashboard access.
    #[default]
    Staff,
}

impl UserRole {
    /// Returns `true` for [`UserRole::Admin`].
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// The value stored in the profile document.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Staff => "staff",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "staff" => Ok(Self::Staff),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_string_forms_agree() {
        for role in [UserRole::Admin, UserRole::Staff] {
            let parsed: UserRole = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
            assert_eq!(
                serde_json::to_string(&role).unwrap(),
                format!("\"{}\"", role.as_str())
            );
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!("super_admin".parse::<UserRole>().is_err());
        assert!("Admin".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_only_admin_is_admin() {
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::Staff.is_admin());
        assert_eq!(UserRole::default(), UserRole::Staff);
    }
}
