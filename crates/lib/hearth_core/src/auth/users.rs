//! User directory: credential storage, first-user bootstrap and family
//! assignment.
//!
//! Collections:
//! - `users`: [`UserRecord`] keyed by user id;
//! - `user_emails`: `{userId, claimedAt}` keyed by the exact email string,
//!   written with create-only semantics so two registrations cannot claim one
//!   email;
//! - `system/bootstrap`: `{claimedAt}` claim taken by the first registration.
//!
//! A claim is written before the document it guards. If the process dies in
//! between, the claim is left behind with nothing behind it; once it is older
//! than [`CLAIM_TTL_SECS`] the next claimant takes it over.

use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use tracing::{info, warn};

use super::AuthError;
use super::password::{hash_password, verify_password};
use crate::families::create_family;
use crate::models::auth::{NewUser, User, UserRecord};
use crate::store::{DocumentStore, Filter, StoreError};
use crate::uuid::uuidv7;

pub const USERS: &str = "users";
const USER_EMAILS: &str = "user_emails";
const SYSTEM: &str = "system";
const BOOTSTRAP_CLAIM: &str = "bootstrap";

/// Age after which a claim whose guarded document never appeared counts as
/// abandoned. Far longer than any registration takes.
pub const CLAIM_TTL_SECS: i64 = 5 * 60;

fn parse_record(id: &str, data: serde_json::Value) -> Result<UserRecord, AuthError> {
    serde_json::from_value(data)
        .map_err(|e| StoreError::Corrupt(format!("{USERS}/{id}: {e}")).into())
}

/// Claims without a readable `claimedAt` are treated as abandoned.
fn claim_expired(claim: &Value, now: DateTime<Utc>) -> bool {
    claim
        .get("claimedAt")
        .cloned()
        .and_then(|v| serde_json::from_value::<DateTime<Utc>>(v).ok())
        .is_none_or(|claimed_at| now - claimed_at > Duration::seconds(CLAIM_TTL_SECS))
}

/// Outcome of a create-only claim attempt.
enum Claim {
    Taken,
    /// Someone else holds it; carries the claim document as read.
    Held(Value),
}

async fn try_claim(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    claim: &Value,
) -> Result<Claim, AuthError> {
    if store.create(collection, id, claim.clone()).await? {
        return Ok(Claim::Taken);
    }
    if let Some(existing) = store.get(collection, id).await? {
        return Ok(Claim::Held(existing));
    }
    // Released since the create above.
    if store.create(collection, id, claim.clone()).await? {
        return Ok(Claim::Taken);
    }
    Ok(Claim::Held(Value::Null))
}

/// Replace the abandoned claim `expected` with `claim`.
///
/// Compare-and-swap on the observed document: of several callers racing for
/// the same abandoned claim exactly one wins.
async fn take_over_claim(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    expected: Value,
    claim: Value,
) -> Result<bool, AuthError> {
    let observed = expected.clone();
    let before = store
        .read_modify_write(
            collection,
            id,
            Box::new(move |current: &Value| (*current == observed).then_some(claim)),
        )
        .await?;
    let taken = before.as_ref() == Some(&expected);
    if taken {
        warn!(collection, id, "took over abandoned claim");
    }
    Ok(taken)
}

/// Whether at least one user exists.
pub async fn has_users(store: &dyn DocumentStore) -> Result<bool, AuthError> {
    let found = store.find(USERS, &Filter::all(), Some(1)).await?;
    Ok(!found.is_empty())
}

/// Take the bootstrap claim. Call only after [`has_users`] returned `false`.
///
/// A claim left by a first registration that never finished is taken over
/// once it is older than [`CLAIM_TTL_SECS`]; a younger one means a first
/// registration is in flight and the caller gets `false`.
pub async fn claim_bootstrap(store: &dyn DocumentStore) -> Result<bool, AuthError> {
    let now = Utc::now();
    let claim = json!({ "claimedAt": now });
    match try_claim(store, SYSTEM, BOOTSTRAP_CLAIM, &claim).await? {
        Claim::Taken => Ok(true),
        Claim::Held(existing) if claim_expired(&existing, now) => {
            take_over_claim(store, SYSTEM, BOOTSTRAP_CLAIM, existing, claim).await
        }
        Claim::Held(_) => Ok(false),
    }
}

/// Give the bootstrap claim back after a failed first registration.
pub async fn release_bootstrap(store: &dyn DocumentStore) -> Result<(), AuthError> {
    store.delete(SYSTEM, BOOTSTRAP_CLAIM).await?;
    Ok(())
}

/// An email claim is live while its user exists or its registration may
/// still be running.
async fn email_claim_live(
    store: &dyn DocumentStore,
    claim: &Value,
    now: DateTime<Utc>,
) -> Result<bool, AuthError> {
    if let Some(owner) = claim.get("userId").and_then(Value::as_str)
        && store.get(USERS, owner).await?.is_some()
    {
        return Ok(true);
    }
    Ok(!claim_expired(claim, now))
}

/// Whether `email` already belongs to a user. Exact, case-sensitive match.
pub async fn email_registered(store: &dyn DocumentStore, email: &str) -> Result<bool, AuthError> {
    let Some(claim) = store.get(USER_EMAILS, email).await? else {
        return Ok(false);
    };
    email_claim_live(store, &claim, Utc::now()).await
}

/// Create a user. Returns `None` if the email is already registered.
///
/// Without a family id a new family named after the user is created. The
/// returned profile never contains the password hash.
pub async fn create_user(
    store: &dyn DocumentStore,
    new_user: NewUser,
    bcrypt_cost: u32,
) -> Result<Option<User>, AuthError> {
    let user_id = uuidv7().to_string();
    // Hash before claiming so the claim is held only across store writes.
    let password_hash = hash_password(&new_user.password, bcrypt_cost).await?;

    let now = Utc::now();
    let claim = json!({ "userId": user_id, "claimedAt": now });
    let claimed = match try_claim(store, USER_EMAILS, &new_user.email, &claim).await? {
        Claim::Taken => true,
        Claim::Held(existing) => {
            !email_claim_live(store, &existing, now).await?
                && take_over_claim(store, USER_EMAILS, &new_user.email, existing, claim).await?
        }
    };
    if !claimed {
        info!(email = %new_user.email, "email already registered");
        return Ok(None);
    }

    let email = new_user.email.clone();
    match insert_user(store, &user_id, new_user, password_hash).await {
        Ok(user) => Ok(Some(user)),
        Err(e) => {
            // Free the email so the caller can retry.
            if let Err(release) = store.delete(USER_EMAILS, &email).await {
                warn!(error = %release, "failed to release email claim");
            }
            Err(e)
        }
    }
}

async fn insert_user(
    store: &dyn DocumentStore,
    user_id: &str,
    new_user: NewUser,
    password_hash: String,
) -> Result<User, AuthError> {
    let family_id = match new_user.family_id {
        Some(id) => id,
        None => {
            let family =
                create_family(store, &format!("{}'s Family", new_user.name), Some(user_id))
                    .await?;
            family.id
        }
    };

    let record = UserRecord {
        name: new_user.name,
        email: new_user.email,
        password_hash,
        family_id,
        role: new_user.role,
        created_at: Utc::now(),
    };
    store
        .set(USERS, user_id, serde_json::to_value(&record).map_err(StoreError::from)?)
        .await?;

    info!(user_id, email = %record.email, role = %record.role, "user created");
    Ok(record.into_user(user_id.to_string()))
}

/// Check an email/password pair. Returns `None` on unknown email or wrong
/// password, without saying which.
pub async fn authenticate_user(
    store: &dyn DocumentStore,
    email: &str,
    password: &str,
) -> Result<Option<User>, AuthError> {
    let Some(doc) = store
        .find(USERS, &Filter::all().eq("email", email), Some(1))
        .await?
        .into_iter()
        .next()
    else {
        return Ok(None);
    };

    let record = parse_record(&doc.id, doc.data)?;
    if !verify_password(password, &record.password_hash).await? {
        return Ok(None);
    }
    Ok(Some(record.into_user(doc.id)))
}

/// Fetch the live profile of a user.
pub async fn get_user(store: &dyn DocumentStore, user_id: &str) -> Result<Option<User>, AuthError> {
    let Some(data) = store.get(USERS, user_id).await? else {
        return Ok(None);
    };
    Ok(Some(parse_record(user_id, data)?.into_user(user_id.to_string())))
}
