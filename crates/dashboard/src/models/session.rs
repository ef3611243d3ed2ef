//! Server-side session keys.

/// Keys used in the tower-sessions store.
pub mod keys {
    /// The signed-in provider session (`AuthSession`).
    pub const CURRENT_SESSION: &str = "current_session";
}
