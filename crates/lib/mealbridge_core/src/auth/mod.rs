//! Authentication and authorization logic.
//!
//! Provides password hashing, signed tokens, the lockout state machine, the
//! per-request gate, the path-based role policy, and the orchestrating
//! [`service::CredentialService`].

pub mod gate;
pub mod jwt;
pub mod lockout;
pub mod password;
pub mod policy;
pub mod service;
pub mod validation;

use thiserror::Error;

use crate::store::StoreError;

pub use jwt::TokenError;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    ValidationFailed(String),

    #[error("Password does not meet security requirements: {0}")]
    WeakPassword(String),

    #[error("Identity already registered: {0}")]
    DuplicateIdentity(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is locked")]
    AccountLocked,

    #[error("Account is disabled")]
    AccountDisabled,

    #[error("Principal not found: {0}")]
    PrincipalNotFound(String),

    #[error("Malformed token")]
    TokenMalformed,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Insufficient authority")]
    Unauthorized,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Malformed => AuthError::TokenMalformed,
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Invalid | TokenError::WrongKind { .. } => AuthError::TokenInvalid,
            TokenError::Encode(msg) => AuthError::Internal(msg),
        }
    }
}
