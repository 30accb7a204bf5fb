//! Authentication request handlers.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{Extension, Json};

use mealbridge_core::auth::AuthError;
use mealbridge_core::auth::gate::AuthenticatedPrincipal;
use mealbridge_core::auth::service::Registration;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::models::{
    LoginRequest, RefreshRequest, RegisterRequest, TokenResponse, TokenStatusQuery,
    TokenStatusResponse, UserResponse,
};

/// `POST /api/auth/register` — create a client or owner account.
pub async fn register_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> AppResult<Json<TokenResponse>> {
    let profile = body.profile();
    let session = state
        .credentials
        .register(Registration {
            email: body.email,
            password: body.password,
            profile,
            is_owner: body.is_owner,
        })
        .await?;
    Ok(Json(session.into()))
}

/// `POST /api/auth/login` — authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let session = state
        .credentials
        .authenticate(&body.email, &body.password)
        .await
        .map_err(|e| match e {
            // Unknown accounts look the same as a wrong password.
            AuthError::PrincipalNotFound(_) => AppError::invalid_credentials(),
            other => other.into(),
        })?;
    Ok(Json(session.into()))
}

/// `POST /api/auth/refresh` — exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let session = state
        .credentials
        .refresh(&body.refresh_token)
        .await
        .map_err(|e| match e {
            AuthError::PrincipalNotFound(_) => AppError::token_invalid(),
            other => other.into(),
        })?;
    Ok(Json(session.into()))
}

/// `GET /api/auth/token-status` — report whether a token has expired.
///
/// Reads `?token=` and falls back to the `Authorization` header.
pub async fn token_status_handler(
    State(state): State<AppState>,
    Query(query): Query<TokenStatusQuery>,
    headers: HeaderMap,
) -> AppResult<Json<TokenStatusResponse>> {
    let token = query
        .token
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        })
        .ok_or_else(|| AppError::Validation("token is required".into()))?;
    Ok(Json(state.credentials.token_status(&token).into()))
}

/// `GET /api/auth/profile` — the authenticated principal.
pub async fn profile_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
) -> AppResult<Json<UserResponse>> {
    let summary = state.credentials.profile(&principal.email).await?;
    Ok(Json(summary.into()))
}
