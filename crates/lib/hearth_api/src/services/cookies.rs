//! Session cookie: build and clear the HTTP-only `auth_token` cookie.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "auth_token";

fn base(value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Session cookie holding `token`, alive as long as the token itself.
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    base(token.to_string(), Duration::seconds(max_age_secs), secure)
}

/// Expired session cookie, sent on logout.
pub fn clear_session_cookie(secure: bool) -> Cookie<'static> {
    base(String::new(), Duration::ZERO, secure)
}
