//! Authentication request handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use axum_extra::extract::cookie::CookieJar;
use hearth_core::auth::invites::{create_invite, validate_invite};
use hearth_core::auth::users::get_user;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    InviteCheckResponse, InviteCodeResponse, LoginRequest, LogoutResponse, RegisterRequest,
    UserResponse,
};
use crate::services::auth::{self, Session};
use crate::services::cookies::{clear_session_cookie, session_cookie};

fn with_session(
    state: &AppState,
    jar: CookieJar,
    session: Session,
) -> (CookieJar, Json<UserResponse>) {
    let cookie = session_cookie(
        &session.token,
        session.max_age_secs,
        state.config.secure_cookies,
    );
    (jar.add(cookie), Json(UserResponse { user: session.user }))
}

/// `POST /api/auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<(CookieJar, Json<UserResponse>)> {
    let Json(body) = payload?;
    let session = auth::login(state.store.as_ref(), &state.tokens, &body).await?;
    Ok(with_session(&state, jar, session))
}

/// `POST /api/auth/register`: create an account, redeeming an invite unless
/// this is the first user.
pub async fn register_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AppResult<(StatusCode, CookieJar, Json<UserResponse>)> {
    let Json(body) = payload?;
    let session = auth::register(
        state.store.as_ref(),
        &state.tokens,
        state.config.bcrypt_cost,
        body,
    )
    .await?;
    let (jar, body) = with_session(&state, jar, session);
    Ok((StatusCode::CREATED, jar, body))
}

/// `POST /api/auth/logout`: clear the session cookie. Tokens are stateless,
/// so nothing is revoked server-side.
pub async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    let jar = jar.add(clear_session_cookie(state.config.secure_cookies));
    (jar, Json(LogoutResponse { success: true }))
}

/// `GET /api/auth/me`: the caller's current profile.
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> AppResult<Json<UserResponse>> {
    let user = get_user(state.store.as_ref(), &user.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;
    Ok(Json(UserResponse { user }))
}

/// `POST /api/auth/invite`: invite someone into the caller's own family.
pub async fn create_invite_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(user)): Extension<AuthenticatedUser>,
) -> AppResult<(StatusCode, Json<InviteCodeResponse>)> {
    let invite = create_invite(state.store.as_ref(), &user.id, &user.family_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(InviteCodeResponse { code: invite.code }),
    ))
}

/// `GET /api/auth/invite/{code}`: whether a code exists and is unused.
pub async fn check_invite_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<InviteCheckResponse>> {
    let valid = validate_invite(state.store.as_ref(), &code).await?;
    Ok(Json(InviteCheckResponse { valid }))
}
