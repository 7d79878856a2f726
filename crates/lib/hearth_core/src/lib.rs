//! # hearth_core
//!
//! Core auth domain for Hearth: session tokens, invite ledger, user directory,
//! families, rate limiting and the document store they sit on.

pub mod auth;
pub mod families;
pub mod migrate;
pub mod models;
pub mod rate_limit;
pub mod store;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
