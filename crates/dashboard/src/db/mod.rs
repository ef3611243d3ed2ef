//! Document store repositories.
//!
//! # Collections
//!
//! - `users` - One profile per identity, document id = uid
//! - `lastViewed` - One view-state record per identity, document id = uid
//! - tracked collections (`inventory`, `requests`, ...) - only `createdAt`
//!   is read, through the unseen-item counter
//!
//! Repositories borrow the store handle, mirroring how request handlers
//! borrow the shared state.

pub mod profiles;
pub mod view_state;

use thiserror::Error;

use crate::backend::BackendError;

pub use profiles::ProfileRepository;
pub use view_state::ViewStateRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The document store call failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A stored document does not have the expected shape.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}
