//! Domain models shared by `hearth_core` and `hearth_api`.

pub mod auth;
pub mod family;
