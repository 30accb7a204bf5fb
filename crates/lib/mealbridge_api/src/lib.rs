//! # mealbridge_api
//!
//! HTTP API library for Meal Bridge authentication.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use mealbridge_core::auth::gate::{AuthenticationGate, PublicPaths};
use mealbridge_core::auth::jwt::TokenService;
use mealbridge_core::auth::lockout::LockoutPolicy;
use mealbridge_core::auth::password::PasswordHasher;
use mealbridge_core::auth::policy::{AuthorizationPolicy, PatternError};
use mealbridge_core::auth::service::CredentialService;
use mealbridge_core::clock::Clock;
use mealbridge_core::store::CredentialStore;

use crate::config::ApiConfig;
use crate::handlers::{admin, auth, health};

/// Route paths.
pub mod routes {
    pub const POST_AUTH_REGISTER: &str = "/api/auth/register";
    pub const POST_AUTH_LOGIN: &str = "/api/auth/login";
    pub const POST_AUTH_REFRESH: &str = "/api/auth/refresh";
    pub const GET_AUTH_TOKEN_STATUS: &str = "/api/auth/token-status";
    pub const GET_AUTH_PROFILE: &str = "/api/auth/profile";
    pub const PUT_AUTH_ROLES: &str = "/api/auth/roles";
    pub const POST_AUTH_UNLOCK: &str = "/api/auth/unlock";
    pub const POST_AUTH_DISABLE: &str = "/api/auth/disable";
    pub const POST_AUTH_ENABLE: &str = "/api/auth/enable";
    pub const GET_HEALTH: &str = "/api/health";
}

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialService>,
    pub gate: Arc<AuthenticationGate>,
    pub policy: Arc<AuthorizationPolicy>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Wire the security core around a store and a clock. The signing key is
    /// derived here once and shared by every request.
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PatternError> {
        let auth = &config.auth;
        let tokens = Arc::new(TokenService::new(auth, clock.clone()));
        let lockout = Arc::new(LockoutPolicy::new(auth, store.clone(), clock.clone()));
        let gate = AuthenticationGate::new(
            tokens.clone(),
            store.clone(),
            lockout.clone(),
            PublicPaths::defaults()?,
            clock.clone(),
        );
        let credentials = CredentialService::new(
            store,
            PasswordHasher::new(auth.bcrypt_cost),
            tokens,
            lockout,
            clock,
        );
        Ok(Self {
            credentials: Arc::new(credentials),
            gate: Arc::new(gate),
            policy: Arc::new(AuthorizationPolicy::default_rules()?),
            config,
        })
    }
}

/// Run the credential store's embedded migrations.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    mealbridge_core::store::postgres::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
///
/// Every route passes through the gate and then the authorization policy;
/// public paths are recognised by the gate itself.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(routes::POST_AUTH_REGISTER, post(auth::register_handler))
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(routes::GET_AUTH_TOKEN_STATUS, get(auth::token_status_handler))
        .route(routes::GET_AUTH_PROFILE, get(auth::profile_handler))
        .route(routes::PUT_AUTH_ROLES, put(admin::update_roles_handler))
        .route(routes::POST_AUTH_UNLOCK, post(admin::unlock_handler))
        .route(routes::POST_AUTH_DISABLE, post(admin::disable_handler))
        .route(routes::POST_AUTH_ENABLE, post(admin::enable_handler))
        .route(routes::GET_HEALTH, get(health::health_handler))
        // Layers run bottom-up: gate first, then the policy.
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authorize,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::authenticate,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
