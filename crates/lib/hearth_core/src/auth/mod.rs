//! Authentication and authorization logic.
//!
//! Session tokens, password hashing, the invite ledger and the user directory.
//! Shared by `hearth_api` handlers and guards.

pub mod invites;
pub mod password;
pub mod token;
pub mod users;

use thiserror::Error;

use crate::store::StoreError;

/// Authentication errors.
///
/// Expected negative outcomes (bad token, used invite, wrong password) are
/// reported as `None`/`false` by the operations themselves; these variants
/// cover configuration and infrastructure failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}
