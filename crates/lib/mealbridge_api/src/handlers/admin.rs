//! Administrative handlers. The authorization policy restricts these routes
//! to `ADMIN`.

use std::collections::BTreeSet;

use axum::extract::State;
use axum::{Extension, Json};

use mealbridge_core::auth::gate::AuthenticatedPrincipal;
use mealbridge_core::models::auth::Role;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::extract::ApiJson;
use crate::models::{AccountRequest, UpdateRolesRequest, UserResponse};

/// `PUT /api/auth/roles` — replace a principal's role set.
pub async fn update_roles_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedPrincipal>,
    ApiJson(body): ApiJson<UpdateRolesRequest>,
) -> AppResult<Json<UserResponse>> {
    let roles = body
        .roles
        .iter()
        .map(|r| r.parse::<Role>())
        .collect::<Result<BTreeSet<_>, _>>()
        .map_err(AppError::Validation)?;
    let summary = state
        .credentials
        .update_roles(&admin.email, &body.email, roles)
        .await?;
    Ok(Json(summary.into()))
}

/// `POST /api/auth/unlock` — clear a lock and reset the failure counter.
pub async fn unlock_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AccountRequest>,
) -> AppResult<Json<UserResponse>> {
    Ok(Json(state.credentials.unlock(&body.email).await?.into()))
}

/// `POST /api/auth/disable`
pub async fn disable_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AccountRequest>,
) -> AppResult<Json<UserResponse>> {
    Ok(Json(state.credentials.disable(&body.email).await?.into()))
}

/// `POST /api/auth/enable`
pub async fn enable_handler(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AccountRequest>,
) -> AppResult<Json<UserResponse>> {
    Ok(Json(state.credentials.enable(&body.email).await?.into()))
}
