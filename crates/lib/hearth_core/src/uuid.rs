//! Identifier helpers.
//!
//! Users, families and generic documents get UUIDv7 keys so that key order
//! follows creation order in both store backends.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}
