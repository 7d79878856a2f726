//! Admin request handlers. Mounted behind `require_admin`.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::{Extension, Json};
use hearth_core::auth::invites::create_invite;
use hearth_core::families::{create_family, get_family, list_families};
use tracing::info;
use url::Url;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    AdminInviteRequest, AdminInviteResponse, CreateFamilyRequest, FamiliesResponse,
    FamilyResponse,
};

/// Registration link carrying `code`, relative to the public web app URL.
pub fn invite_url(public_url: &Url, code: &str) -> AppResult<String> {
    let mut url = public_url
        .join("/register")
        .map_err(|e| AppError::Internal(format!("invite URL: {e}")))?;
    url.query_pairs_mut().append_pair("invite", code);
    Ok(url.into())
}

/// `POST /api/admin/invite`: invite someone into any existing family.
pub async fn create_invite_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(admin)): Extension<AuthenticatedUser>,
    payload: Result<Json<AdminInviteRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AdminInviteResponse>)> {
    let Json(body) = payload?;
    let family_id = body
        .family_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("familyId is required".into()))?;

    if get_family(state.store.as_ref(), &family_id).await?.is_none() {
        return Err(AppError::Validation(format!("Unknown family: {family_id}")));
    }

    let invite = create_invite(state.store.as_ref(), &admin.id, &family_id).await?;
    let invite_url = invite_url(&state.config.public_url, &invite.code)?;
    Ok((
        StatusCode::CREATED,
        Json(AdminInviteResponse {
            code: invite.code,
            invite_url,
        }),
    ))
}

/// `GET /api/admin/families`: every family with its member count.
pub async fn list_families_handler(
    State(state): State<AppState>,
) -> AppResult<Json<FamiliesResponse>> {
    let families = list_families(state.store.as_ref()).await?;
    Ok(Json(FamiliesResponse { families }))
}

/// `POST /api/admin/families`: create an empty family.
pub async fn create_family_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(admin)): Extension<AuthenticatedUser>,
    payload: Result<Json<CreateFamilyRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<FamilyResponse>)> {
    let Json(body) = payload?;
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Family name is required".into()));
    }
    let family = create_family(state.store.as_ref(), name, Some(&admin.id)).await?;
    info!(admin_id = %admin.id, family_id = %family.id, "family created by admin");
    Ok((StatusCode::CREATED, Json(FamilyResponse { family })))
}
