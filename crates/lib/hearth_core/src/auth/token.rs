//! Session token creation and verification.
//!
//! Tokens are HS256 JWTs (`header.payload.signature`, base64url segments)
//! signed with a server-held secret. They are stateless: any process holding
//! the secret can verify them, and nothing revokes them before `exp`.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;

use super::AuthError;
use crate::models::auth::{TokenClaims, User};

/// Session lifetime after login: 7 days.
pub const LOGIN_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Session lifetime after registration: 24 hours.
pub const REGISTRATION_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

/// Signs and verifies session tokens with one shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from the signing secret.
    ///
    /// An empty secret is a startup error: the process must not serve
    /// requests without one.
    pub fn new(secret: &str) -> Result<Self, AuthError> {
        if secret.trim().is_empty() {
            return Err(AuthError::Config("session signing secret is not set".into()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        // `exp` is checked whenever present; claim presence is enforced by
        // `TokenClaims` deserialization instead.
        validation.required_spec_claims = HashSet::new();

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Mint a token for `user`, valid for `validity_secs` from now.
    pub fn create_token(&self, user: &User, validity_secs: i64) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            family_id: user.family_id.clone(),
            role: user.role,
            exp: Some((now + Duration::seconds(validity_secs)).timestamp()),
            iat: Some(now.timestamp()),
        };
        self.encode_claims(&claims)
    }

    /// Sign an arbitrary claim set.
    pub fn encode_claims(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify a token and return the user it was minted for.
    ///
    /// Every failure mode (wrong segment count, bad signature, bad base64 or
    /// JSON, missing or mistyped claims, past `exp`) yields `None`.
    pub fn verify_token(&self, token: &str) -> Option<User> {
        match decode::<TokenClaims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(data.claims.into_user()),
            Err(e) => {
                debug!(error = %e, "session token rejected");
                None
            }
        }
    }
}
