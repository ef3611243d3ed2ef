//! Business logic services for the dashboard.
//!
//! # Services
//!
//! - `gate` - Provider session to profile resolution, with token refresh
//! - `auth` - Handle and password sign-in
//! - `notifications` - Unseen-item counts per tracked collection
//! - `profile_editor` - Self-service profile edits with re-authentication
//! - `users` - Admin-only user management and first-admin bootstrap
//!
//! Services borrow the backend handles from `AppState` for the duration of
//! a request.

pub mod auth;
pub mod error;
pub mod gate;
pub mod notifications;
pub mod profile_editor;
pub mod users;

pub use auth::AuthService;
pub use error::AccountError;
pub use gate::{GateOutcome, GateRejection, SessionGate};
pub use notifications::UnseenCounter;
pub use profile_editor::{ProfileEditor, ProfileForm, ProfileSaveOutcome};
pub use users::{NewUserForm, UserAdminService};
