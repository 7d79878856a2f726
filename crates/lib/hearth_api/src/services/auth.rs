//! Authentication service: login and invite-gated registration flows on top
//! of `hearth_core::auth`.

use hearth_core::auth::invites::{redeem_invite, validate_invite};
use hearth_core::auth::token::{LOGIN_TOKEN_TTL_SECS, REGISTRATION_TOKEN_TTL_SECS, TokenCodec};
use hearth_core::auth::users::{
    authenticate_user, claim_bootstrap, create_user, email_registered, has_users,
    release_bootstrap,
};
use hearth_core::models::auth::{NewUser, Role, User};
use hearth_core::store::DocumentStore;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{LoginRequest, RegisterRequest};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

const INVALID_INVITE: &str = "Invalid or missing invite code";

/// A signed-in user and the token for their session cookie.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
    /// Token validity, reused as the cookie max-age.
    pub max_age_secs: i64,
}

impl Session {
    fn issue(tokens: &TokenCodec, user: User, validity_secs: i64) -> AppResult<Self> {
        let token = tokens.create_token(&user, validity_secs)?;
        Ok(Self {
            user,
            token,
            max_age_secs: validity_secs,
        })
    }
}

fn validate_registration(body: &RegisterRequest) -> AppResult<()> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }
    if !body.email.contains('@') {
        return Err(AppError::Validation("A valid email is required".into()));
    }
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Check credentials and open a session.
pub async fn login(
    store: &dyn DocumentStore,
    tokens: &TokenCodec,
    body: &LoginRequest,
) -> AppResult<Session> {
    if body.email.is_empty() || body.password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".into(),
        ));
    }

    let Some(user) = authenticate_user(store, &body.email, &body.password).await? else {
        warn!(email = %body.email, "login failed");
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    };

    info!(user_id = %user.id, "user logged in");
    Session::issue(tokens, user, LOGIN_TOKEN_TTL_SECS)
}

/// Register a user.
///
/// The first account in an empty system becomes `admin` of a new family and
/// needs no invite. Every later account must redeem an invite and joins the
/// invite's family as `member`.
pub async fn register(
    store: &dyn DocumentStore,
    tokens: &TokenCodec,
    bcrypt_cost: u32,
    body: RegisterRequest,
) -> AppResult<Session> {
    validate_registration(&body)?;

    if !has_users(store).await? && claim_bootstrap(store).await? {
        let user = register_first_admin(store, bcrypt_cost, body).await?;
        return Session::issue(tokens, user, REGISTRATION_TOKEN_TTL_SECS);
    }

    let Some(code) = body.invite_code.as_deref().filter(|c| !c.is_empty()) else {
        return Err(AppError::Forbidden(INVALID_INVITE.into()));
    };

    // Vet the code first: without a usable invite the caller learns nothing
    // about which emails are registered.
    if !validate_invite(store, code).await? {
        return Err(AppError::Forbidden(INVALID_INVITE.into()));
    }

    // Refuse a known email before burning the invite.
    if email_registered(store, &body.email).await? {
        return Err(AppError::Validation("Email already registered".into()));
    }

    let Some(family_id) = redeem_invite(store, code).await? else {
        return Err(AppError::Forbidden(INVALID_INVITE.into()));
    };

    let new_user = NewUser {
        name: body.name,
        email: body.email,
        password: body.password,
        family_id: Some(family_id),
        role: Role::Member,
    };
    let Some(user) = create_user(store, new_user, bcrypt_cost).await? else {
        warn!(code, "invite consumed by a registration that lost the email race");
        return Err(AppError::Validation("Email already registered".into()));
    };

    info!(user_id = %user.id, family_id = %user.family_id, "user registered with invite");
    Session::issue(tokens, user, REGISTRATION_TOKEN_TTL_SECS)
}

async fn register_first_admin(
    store: &dyn DocumentStore,
    bcrypt_cost: u32,
    body: RegisterRequest,
) -> AppResult<User> {
    let new_user = NewUser {
        name: body.name,
        email: body.email,
        password: body.password,
        family_id: None,
        role: Role::Admin,
    };

    let created = create_user(store, new_user, bcrypt_cost).await;
    match created {
        Ok(Some(user)) => {
            info!(user_id = %user.id, family_id = %user.family_id, "first user registered as admin");
            Ok(user)
        }
        Ok(None) => {
            release_bootstrap(store).await?;
            Err(AppError::Validation("Email already registered".into()))
        }
        Err(e) => {
            if let Err(release) = release_bootstrap(store).await {
                warn!(error = %release, "failed to release bootstrap claim");
            }
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::auth::invites::create_invite;
    use hearth_core::store::MemoryStore;

    const COST: u32 = 4;

    fn codec() -> TokenCodec {
        TokenCodec::new("test-secret").unwrap()
    }

    fn request(name: &str, email: &str, invite_code: Option<&str>) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: "password123".into(),
            invite_code: invite_code.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn first_registration_bootstraps_admin() {
        let store = MemoryStore::new();
        let session = register(&store, &codec(), COST, request("Alice", "alice@test.com", None))
            .await
            .unwrap();
        assert_eq!(session.user.role, Role::Admin);
        assert_eq!(session.max_age_secs, REGISTRATION_TOKEN_TTL_SECS);
        assert_eq!(codec().verify_token(&session.token), Some(session.user));
    }

    #[tokio::test]
    async fn later_registration_needs_invite() {
        let store = MemoryStore::new();
        let tokens = codec();
        register(&store, &tokens, COST, request("Alice", "alice@test.com", None))
            .await
            .unwrap();

        let err = register(&store, &tokens, COST, request("Bob", "bob@test.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m == INVALID_INVITE));

        let err = register(&store, &tokens, COST, request("Bob", "bob@test.com", Some("BAD00000")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn invited_user_joins_family_as_member() {
        let store = MemoryStore::new();
        let tokens = codec();
        let alice = register(&store, &tokens, COST, request("Alice", "alice@test.com", None))
            .await
            .unwrap()
            .user;
        let invite = create_invite(&store, &alice.id, &alice.family_id).await.unwrap();

        let bob = register(
            &store,
            &tokens,
            COST,
            request("Bob", "bob@test.com", Some(&invite.code)),
        )
        .await
        .unwrap()
        .user;
        assert_eq!(bob.role, Role::Member);
        assert_eq!(bob.family_id, alice.family_id);

        // The invite is spent.
        let err = register(
            &store,
            &tokens,
            COST,
            request("Carol", "carol@test.com", Some(&invite.code)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn duplicate_email_keeps_invite_unspent() {
        let store = MemoryStore::new();
        let tokens = codec();
        let alice = register(&store, &tokens, COST, request("Alice", "alice@test.com", None))
            .await
            .unwrap()
            .user;
        let invite = create_invite(&store, &alice.id, &alice.family_id).await.unwrap();

        let err = register(
            &store,
            &tokens,
            COST,
            request("Alice again", "alice@test.com", Some(&invite.code)),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(
            hearth_core::auth::invites::validate_invite(&store, &invite.code)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn registration_input_is_validated() {
        let store = MemoryStore::new();
        let tokens = codec();
        let mut short = request("Alice", "alice@test.com", None);
        short.password = "short".into();
        for body in [
            request(" ", "alice@test.com", None),
            request("Alice", "not-an-email", None),
            short,
        ] {
            let err = register(&store, &tokens, COST, body).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        // Nothing was bootstrapped by the rejected attempts.
        assert!(!has_users(&store).await.unwrap());
    }

    #[tokio::test]
    async fn login_checks_credentials() {
        let store = MemoryStore::new();
        let tokens = codec();
        register(&store, &tokens, COST, request("Alice", "alice@test.com", None))
            .await
            .unwrap();

        let session = login(
            &store,
            &tokens,
            &LoginRequest {
                email: "alice@test.com".into(),
                password: "password123".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(session.user.email, "alice@test.com");
        assert_eq!(session.max_age_secs, LOGIN_TOKEN_TTL_SECS);

        let err = login(
            &store,
            &tokens,
            &LoginRequest {
                email: "alice@test.com".into(),
                password: "wrong-password".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = login(
            &store,
            &tokens,
            &LoginRequest {
                email: String::new(),
                password: String::new(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn made_up_code_is_forbidden_for_known_and_unknown_emails() {
        let store = MemoryStore::new();
        let tokens = codec();
        register(&store, &tokens, COST, request("Alice", "alice@test.com", None))
            .await
            .unwrap();

        for email in ["alice@test.com", "nobody@test.com"] {
            let err = register(&store, &tokens, COST, request("X", email, Some("BOGUS123")))
                .await
                .unwrap_err();
            assert!(
                matches!(err, AppError::Forbidden(ref m) if m == INVALID_INVITE),
                "{email}: {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn leftover_bootstrap_claim_does_not_lock_out_first_user() {
        let store = MemoryStore::new();
        let abandoned = chrono::Utc::now()
            - chrono::Duration::seconds(hearth_core::auth::users::CLAIM_TTL_SECS + 60);
        store
            .set("system", "bootstrap", serde_json::json!({ "claimedAt": abandoned }))
            .await
            .unwrap();
        assert!(!has_users(&store).await.unwrap());

        let session = register(&store, &codec(), COST, request("Alice", "alice@test.com", None))
            .await
            .unwrap();
        assert_eq!(session.user.role, Role::Admin);
    }

    #[tokio::test]
    async fn leftover_email_claim_does_not_block_registration() {
        let store = MemoryStore::new();
        store
            .set(
                "user_emails",
                "alice@test.com",
                serde_json::json!({ "userId": "never-written" }),
            )
            .await
            .unwrap();

        let session = register(&store, &codec(), COST, request("Alice", "alice@test.com", None))
            .await
            .unwrap();
        assert_eq!(session.user.email, "alice@test.com");
    }
}
