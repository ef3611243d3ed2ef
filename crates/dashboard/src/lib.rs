//! Stockroom dashboard library.
//!
//! Session gate, unseen-item notifications, profile editing and user
//! administration for the internal inventory dashboard, served as a JSON
//! API. Exposed as a library so the CLI and integration tests can drive the
//! same services and router.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
