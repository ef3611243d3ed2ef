//! Core types for Stockroom.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod collection;
pub mod email;
pub mod handle;
pub mod id;
pub mod role;

pub use collection::{CollectionName, CollectionNameError};
pub use email::{Email, EmailError};
pub use handle::{Handle, HandleError};
pub use id::UserUid;
pub use role::UserRole;
