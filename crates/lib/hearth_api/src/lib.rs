//! # hearth_api
//!
//! HTTP API library for Hearth: auth endpoints, admin endpoints, session
//! guards and edge rate limiting.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use hearth_core::auth::token::TokenCodec;
use hearth_core::rate_limit::RateLimiter;
use hearth_core::store::DocumentStore;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{admin, auth};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Document store holding users, families and invites.
    pub store: Arc<dyn DocumentStore>,
    /// API configuration.
    pub config: ApiConfig,
    /// Session token signer/verifier.
    pub tokens: Arc<TokenCodec>,
    /// Edge rate limiter.
    pub rate_limiter: Arc<dyn RateLimiter>,
}

impl AppState {
    /// Build the state, deriving the token codec from the configured secret.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        config: ApiConfig,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Result<Self, hearth_core::auth::AuthError> {
        let tokens = Arc::new(TokenCodec::new(&config.session_secret)?);
        Ok(Self {
            store,
            config,
            tokens,
            rate_limiter,
        })
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(routes::GET_AUTH_INVITE_CODE, get(auth::check_invite_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(routes::POST_AUTH_INVITE, post(auth::create_invite_handler))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    // Admin routes (stored role must be admin)
    let admin = Router::new()
        .route(routes::POST_ADMIN_INVITE, post(admin::create_invite_handler))
        .route(
            routes::ADMIN_FAMILIES,
            get(admin::list_families_handler).post(admin::create_family_handler),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(admin)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
