//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use mealbridge_core::auth::AuthError;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Authentication failure. `code` is the stable machine-readable name.
    #[error("Unauthorized: {message}")]
    Unauthorized { code: &'static str, message: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    fn unauthorized(code: &'static str, message: &str) -> Self {
        AppError::Unauthorized {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_credentials() -> Self {
        Self::unauthorized("invalid_credentials", "Invalid credentials")
    }

    pub fn token_invalid() -> Self {
        Self::unauthorized("token_invalid", "Invalid token")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::Conflict(m) => (StatusCode::CONFLICT, "duplicate_identity", m.as_str()),
            AppError::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, *code, message.as_str())
            }
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Internal(detail) => {
                error!("internal error: {detail}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::ValidationFailed(msg) | AuthError::WeakPassword(msg) => {
                AppError::Validation(msg)
            }
            AuthError::DuplicateIdentity(email) => {
                AppError::Conflict(format!("{email} is already registered"))
            }
            AuthError::InvalidCredentials => AppError::invalid_credentials(),
            AuthError::AccountLocked => {
                AppError::unauthorized("account_locked", "Account is locked")
            }
            AuthError::AccountDisabled => {
                AppError::unauthorized("account_disabled", "Account is disabled")
            }
            AuthError::PrincipalNotFound(email) => {
                AppError::NotFound(format!("No account for {email}"))
            }
            AuthError::TokenMalformed => {
                AppError::unauthorized("token_malformed", "Malformed token")
            }
            AuthError::TokenExpired => AppError::unauthorized("token_expired", "Token expired"),
            AuthError::TokenInvalid => AppError::token_invalid(),
            AuthError::Unauthorized => AppError::Forbidden("Insufficient authority".into()),
            AuthError::Store(e) => AppError::Internal(e.to_string()),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
