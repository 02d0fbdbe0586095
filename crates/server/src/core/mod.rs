//! Core Service Layer
//!
//! Shared infrastructure for the Affinity server: request context,
//! authentication, error mapping and the SQLite pool.

pub mod auth;
pub mod ctx;
pub mod db;
pub mod error;

// Re-exports for convenience
pub use ctx::Ctx;
pub use error::{Error, Result};
