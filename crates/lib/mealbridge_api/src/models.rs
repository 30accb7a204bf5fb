//! Request and response bodies.
//!
//! Field names are camelCase on the wire.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mealbridge_core::auth::service::TokenStatus;
use mealbridge_core::models::auth::{
    AuthSession, Gender, PrincipalKind, PrincipalSummary, Profile, Role,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    /// Registers a mess owner instead of a client.
    #[serde(default)]
    pub is_owner: bool,
}

impl RegisterRequest {
    pub fn profile(&self) -> Profile {
        Profile {
            first_name: self.first_name.clone(),
            middle_name: self.middle_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            gender: self.gender,
            dob: self.dob,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRolesRequest {
    pub email: String,
    /// Role names; `ADMIN`, `admin` and `ROLE_ADMIN` are all accepted.
    pub roles: Vec<String>,
}

/// Target of an administrative unlock, disable, or enable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub kind: PrincipalKind,
    pub email: String,
    pub phone: Option<String>,
    pub roles: Vec<Role>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub salutation: Option<String>,
    pub enabled: bool,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<PrincipalSummary> for UserResponse {
    fn from(p: PrincipalSummary) -> Self {
        Self {
            id: p.id,
            kind: p.kind,
            email: p.email,
            phone: p.phone,
            roles: p.roles,
            first_name: p.first_name,
            middle_name: p.middle_name,
            last_name: p.last_name,
            dob: p.dob,
            salutation: p.salutation,
            enabled: p.enabled,
            locked_until: p.locked_until,
            created_at: p.created_at,
            last_login_at: p.last_login_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserResponse,
}

impl From<AuthSession> for TokenResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            access_token: session.tokens.access_token,
            refresh_token: session.tokens.refresh_token,
            token_type: "Bearer".into(),
            expires_in: session.tokens.expires_in,
            user: session.principal.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStatusQuery {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatusResponse {
    pub expired: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<TokenStatus> for TokenStatusResponse {
    fn from(s: TokenStatus) -> Self {
        Self {
            expired: s.expired,
            expires_at: s.expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
