//! Session guards: cookie extraction, token verification and admin checks.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use hearth_core::auth::users::get_user;
use hearth_core::models::auth::{Role, User};
use tracing::debug;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::services::cookies::SESSION_COOKIE;

const UNAUTHENTICATED: &str = "Authentication required";

/// Identity of the caller, inserted into request extensions by the guards.
///
/// Behind `require_admin` the role is the stored one, not the token's.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// Resolve the session cookie in `headers` to the user it was issued for.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> AppResult<User> {
    let jar = CookieJar::from_headers(headers);
    let Some(cookie) = jar.get(SESSION_COOKIE) else {
        debug!("no session cookie");
        return Err(AppError::Unauthorized(UNAUTHENTICATED.into()));
    };
    state
        .tokens
        .verify_token(cookie.value())
        .ok_or_else(|| AppError::Unauthorized(UNAUTHENTICATED.into()))
}

/// Replace the token's view of `user` with the stored profile and require
/// the admin role.
pub async fn authorize_admin(state: &AppState, user: User) -> AppResult<User> {
    let Some(live) = get_user(state.store.as_ref(), &user.id).await? else {
        debug!(user_id = %user.id, "token subject no longer exists");
        return Err(AppError::Unauthorized(UNAUTHENTICATED.into()));
    };
    if live.role != Role::Admin {
        debug!(user_id = %live.id, token_role = %user.role, "admin access denied");
        return Err(AppError::Forbidden("Admin access required".into()));
    }
    Ok(live)
}

/// Axum middleware: requires a valid session cookie and injects
/// [`AuthenticatedUser`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, request.headers())?;
    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Axum middleware: like [`require_auth`], then checks the caller's current
/// role in the store.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, request.headers())?;
    let user = authorize_admin(&state, user).await?;
    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}
