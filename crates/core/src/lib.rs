//! Stockroom Core - Shared types library.
//!
//! This crate provides common types used across the Stockroom components:
//! - `dashboard` - Session gate, notification counters and user management
//! - `cli` - Operator tooling (bootstrap, user listing, unseen counts)
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no backend clients, no HTTP.
//! Every value that crosses the backend boundary as a plain string (handles,
//! emails, collection names, identity references) gets a validated newtype
//! here so the rest of the workspace never handles raw user input.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for handles, emails, uids, roles and collections

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
