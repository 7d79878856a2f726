//! Invite ledger: single-use, time-boxed codes that gate registration.
//!
//! Invites live in the `invites` collection keyed by their code. They are
//! never deleted; redemption flips `used` inside the store's
//! read-modify-write transaction so that exactly one concurrent redeemer wins.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use super::AuthError;
use crate::models::auth::Invite;
use crate::store::{DocumentStore, StoreError};

const INVITES: &str = "invites";

/// Characters kept from the UUID when deriving a code.
const CODE_LEN: usize = 8;

/// Invites older than this cannot be redeemed.
pub const INVITE_TTL_SECS: i64 = 24 * 60 * 60;

fn generate_code() -> String {
    let mut code = uuid::Uuid::new_v4().simple().to_string();
    code.truncate(CODE_LEN);
    code.to_uppercase()
}

fn is_expired(invite: &Invite, now: DateTime<Utc>) -> bool {
    now - invite.created_at > Duration::seconds(INVITE_TTL_SECS)
}

/// Issue a new invite into `family_id` on behalf of `created_by`.
pub async fn create_invite(
    store: &dyn DocumentStore,
    created_by: &str,
    family_id: &str,
) -> Result<Invite, AuthError> {
    let invite = Invite {
        code: generate_code(),
        created_by: created_by.to_string(),
        family_id: family_id.to_string(),
        used: false,
        created_at: Utc::now(),
    };
    store
        .set(
            INVITES,
            &invite.code,
            serde_json::to_value(&invite).map_err(StoreError::from)?,
        )
        .await?;
    info!(code = %invite.code, created_by, family_id, "invite created");
    Ok(invite)
}

/// Whether `code` names an existing, unused invite. Does not look at age.
pub async fn validate_invite(store: &dyn DocumentStore, code: &str) -> Result<bool, AuthError> {
    let Some(data) = store.get(INVITES, code).await? else {
        return Ok(false);
    };
    let invite: Invite = serde_json::from_value(data)
        .map_err(|e| StoreError::Corrupt(format!("{INVITES}/{code}: {e}")))?;
    Ok(!invite.used)
}

/// Consume `code`, returning the family it grants access to.
///
/// Returns `None` when the invite does not exist, was already used, or is
/// older than [`INVITE_TTL_SECS`].
pub async fn redeem_invite(
    store: &dyn DocumentStore,
    code: &str,
) -> Result<Option<String>, AuthError> {
    redeem_invite_at(store, code, Utc::now()).await
}

async fn redeem_invite_at(
    store: &dyn DocumentStore,
    code: &str,
    now: DateTime<Utc>,
) -> Result<Option<String>, AuthError> {
    let before = store
        .read_modify_write(
            INVITES,
            code,
            Box::new(move |current: &serde_json::Value| {
                let mut invite: Invite = serde_json::from_value(current.clone()).ok()?;
                if invite.used || is_expired(&invite, now) {
                    return None;
                }
                invite.used = true;
                serde_json::to_value(&invite).ok()
            }),
        )
        .await?;

    let Some(before) = before else {
        info!(code, "invite redemption failed: unknown code");
        return Ok(None);
    };
    let invite: Invite = serde_json::from_value(before)
        .map_err(|e| StoreError::Corrupt(format!("{INVITES}/{code}: {e}")))?;

    // The pre-image decides the outcome: the mutation above wrote `used`
    // exactly when this invite was unused and fresh.
    if invite.used {
        info!(code, "invite redemption failed: already used");
        return Ok(None);
    }
    if is_expired(&invite, now) {
        warn!(code, created_at = %invite.created_at, "invite redemption failed: expired");
        return Ok(None);
    }

    info!(code, family_id = %invite.family_id, "invite redeemed");
    Ok(Some(invite.family_id))
}
