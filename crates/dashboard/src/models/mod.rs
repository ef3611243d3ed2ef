//! Domain models for the dashboard.
//!
//! Documents in the store are schemaless; these types are the validated view
//! the rest of the crate works with. Conversion from raw fields lives next
//! to the repositories in [`crate::db`].

pub mod notification;
pub mod profile;
pub mod session;
pub mod view_state;

pub use notification::UnseenCount;
pub use profile::UserProfile;
pub use view_state::ViewState;
