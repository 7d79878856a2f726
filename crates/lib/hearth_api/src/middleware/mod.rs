//! Request middleware: edge rate limiting and the session guards.

pub mod auth;
pub mod rate_limit;
