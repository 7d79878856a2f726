//! Authentication domain models.
//!
//! Stored documents use camelCase field names; the same names appear in token
//! payloads and API responses.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authorization level of a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Member,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Public user profile. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub family_id: String,
    pub role: Role,
}

/// User document as persisted in the `users` collection (keyed by user id).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub family_id: String,
    /// Records written before roles existed have no role; they are members.
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// The public profile for the user stored under `id`.
    pub fn into_user(self, id: String) -> User {
        User {
            id,
            name: self.name,
            email: self.email,
            family_id: self.family_id,
            role: self.role,
        }
    }
}

/// Input for [`crate::auth::users::create_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Family to join; `None` mints a new family named after the user.
    pub family_id: Option<String>,
    pub role: Role,
}

/// Single-use permission to join a family. Stored in `invites`, keyed by code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub code: String,
    pub created_by: String,
    pub family_id: String,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

/// Claims carried in a session token payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClaims {
    /// Subject (user ID).
    pub sub: String,
    pub name: String,
    pub email: String,
    pub family_id: String,
    /// Role at mint time. Informational; admin checks re-read the store.
    #[serde(default)]
    pub role: Role,
    /// Expiry (unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Issued at (unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl TokenClaims {
    pub fn into_user(self) -> User {
        User {
            id: self.sub,
            name: self.name,
            email: self.email,
            family_id: self.family_id,
            role: self.role,
        }
    }
}
