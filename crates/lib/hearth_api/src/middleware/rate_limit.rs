//! Edge rate limiting for the unauthenticated and data-mutation endpoints.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use hearth_core::rate_limit::{RateLimitAction, RateLimitDecision};
use tracing::warn;

use crate::AppState;
use crate::error::AppError;
use crate::routes;

/// Path prefixes whose POST/PUT/DELETE requests count as data mutations.
pub const MUTATION_PREFIXES: &[&str] = &[
    "/api/grocery",
    "/api/notes",
    "/api/feeding",
    "/api/medicine",
    "/api/vitamins",
    "/api/weekmenu",
    "/api/community",
    "/api/push",
];

const INVITE_CHECK_PREFIX: &str = "/api/auth/invite/";

fn under_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Which rate-limited action, if any, a request falls under.
pub fn classify(method: &Method, path: &str) -> Option<RateLimitAction> {
    match (method, path) {
        (&Method::POST, routes::POST_AUTH_LOGIN) => Some(RateLimitAction::Login),
        (&Method::POST, routes::POST_AUTH_REGISTER) => Some(RateLimitAction::Register),
        (&Method::POST, routes::POST_AUTH_INVITE) => Some(RateLimitAction::Invite),
        (&Method::GET, _)
            if path
                .strip_prefix(INVITE_CHECK_PREFIX)
                .is_some_and(|code| !code.is_empty() && !code.contains('/')) =>
        {
            Some(RateLimitAction::InviteCheck)
        }
        (&Method::POST | &Method::PUT | &Method::DELETE, _)
            if MUTATION_PREFIXES.iter().any(|p| under_prefix(path, p)) =>
        {
            Some(RateLimitAction::Mutation)
        }
        _ => None,
    }
}

/// Client address: first `X-Forwarded-For` entry, then `X-Real-IP`, then
/// `"unknown"`.
pub fn client_ip(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| header("x-real-ip"))
        .unwrap_or("unknown")
        .to_string()
}

/// Axum middleware: rejects over-limit requests with 429 before routing.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(action) = classify(request.method(), request.uri().path()) else {
        return Ok(next.run(request).await);
    };

    let ip = client_ip(request.headers());
    let key = action.key(&ip);
    if let RateLimitDecision::Limited { retry_after_ms } =
        state.rate_limiter.check(&key, action.limit())
    {
        let retry_after_secs = retry_after_ms.div_ceil(1000).max(1);
        warn!(%action, client_ip = %ip, retry_after_secs, "rate limit exceeded");
        return Err(AppError::RateLimited { retry_after_secs });
    }

    Ok(next.run(request).await)
}
