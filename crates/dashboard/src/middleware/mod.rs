//! HTTP middleware for the dashboard.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing)
//! 3. Session layer (tower-sessions, in-memory store)
//!
//! Authentication is enforced per handler by the extractors in [`auth`].

pub mod auth;
pub mod session;

pub use auth::{
    AuthRejection, RequireAdmin, RequireUser, clear_current_session, current_session,
    set_current_session,
};
pub use session::{SESSION_COOKIE_NAME, create_session_layer};
