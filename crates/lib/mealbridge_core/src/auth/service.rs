//! Credential service — register, login, refresh, and role management.
//!
//! Composes the store, password hasher, token service, and lockout policy.
//! These are the pre-authentication entry points and do not pass through the
//! gate.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::AuthError;
use super::jwt::{TokenService, strip_bearer};
use super::lockout::LockoutPolicy;
use super::password::{PasswordHasher, check_password_strength};
use super::validation::{normalize_email, validate_email, validate_phone};
use crate::clock::Clock;
use crate::models::auth::{
    AuthSession, Principal, PrincipalKind, PrincipalSummary, Profile, Role, TokenKind,
};
use crate::store::{CredentialStore, StoreError};
use crate::uuid::principal_id;

/// Input to [`CredentialService::register`].
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub profile: Profile,
    /// Mess owner/staff account rather than a client.
    pub is_owner: bool,
}

/// Expiry report for a submitted token. Signature is not checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStatus {
    pub expired: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct CredentialService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: Arc<TokenService>,
    lockout: Arc<LockoutPolicy>,
    clock: Arc<dyn Clock>,
}

impl CredentialService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        tokens: Arc<TokenService>,
        lockout: Arc<LockoutPolicy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            lockout,
            clock,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn lockout(&self) -> &LockoutPolicy {
        &self.lockout
    }

    /// Create a principal and issue its first token pair. The first principal
    /// ever registered is also granted `ADMIN`.
    pub async fn register(&self, registration: Registration) -> Result<AuthSession, AuthError> {
        let email = normalize_email(&registration.email);
        validate_email(&email)?;
        let phone = registration
            .profile
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from);
        if let Some(phone) = &phone {
            validate_phone(phone)?;
        }
        if let Some(dob) = registration.profile.dob
            && dob > self.clock.now().date_naive()
        {
            return Err(AuthError::ValidationFailed(
                "date of birth is in the future".into(),
            ));
        }

        if self.store.identity_exists(&email, phone.as_deref()).await? {
            return Err(AuthError::DuplicateIdentity(email));
        }

        check_password_strength(&registration.password)?;

        let kind = if registration.is_owner {
            PrincipalKind::Owner
        } else {
            PrincipalKind::Client
        };
        let mut roles = kind.default_roles();
        let is_first = self.store.count().await? == 0;
        if is_first {
            roles.insert(Role::Admin);
        }

        let password_hash = self.hasher.hash(&registration.password).await?;
        let now = self.clock.now();
        let profile = registration.profile;
        let principal = Principal {
            id: principal_id(),
            kind,
            email: email.clone(),
            phone,
            password_hash,
            roles,
            first_name: profile.first_name,
            middle_name: profile.middle_name,
            last_name: profile.last_name,
            gender: profile.gender,
            dob: profile.dob,
            salutation: profile.gender.map(|g| g.salutation().to_string()),
            enabled: true,
            locked_until: None,
            failed_attempt_count: 0,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };

        let principal = self.store.insert(principal).await.map_err(|e| match e {
            StoreError::Duplicate(_) => AuthError::DuplicateIdentity(email.clone()),
            other => AuthError::Store(other),
        })?;

        if is_first {
            info!(email = %principal.email, "first principal granted admin role");
        }
        info!(email = %principal.email, kind = principal.kind.as_str(), "principal registered");

        let tokens = self.tokens.issue_pair(&principal)?;
        Ok(AuthSession {
            tokens,
            principal: principal.summary(),
        })
    }

    /// Verify a password login. A mismatch counts toward lockout before the
    /// error is returned; the failure that trips the lock reports
    /// `AccountLocked`.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email);
        let principal = self
            .store
            .find_by_identifier(&email)
            .await?
            .ok_or_else(|| AuthError::PrincipalNotFound(email.clone()))?;

        if self.lockout.is_locked(&principal) {
            warn!(email, "login rejected: account locked");
            return Err(AuthError::AccountLocked);
        }

        if !self.hasher.verify(password, &principal.password_hash).await? {
            return Err(self.fail_login(&email).await);
        }

        if !principal.enabled {
            warn!(email, "login rejected: account disabled");
            return Err(AuthError::AccountDisabled);
        }

        let principal = self
            .lockout
            .record_success(&email)
            .await?
            .ok_or_else(|| AuthError::PrincipalNotFound(email.clone()))?;

        info!(email, "principal authenticated");
        let tokens = self.tokens.issue_pair(&principal)?;
        Ok(AuthSession {
            tokens,
            principal: principal.summary(),
        })
    }

    /// Best-effort failure bookkeeping. Never replaces the credential error
    /// with a bookkeeping error.
    async fn fail_login(&self, email: &str) -> AuthError {
        match self.lockout.record_failure(email).await {
            Ok(Some(p)) if self.lockout.is_locked(&p) => AuthError::AccountLocked,
            Ok(_) => AuthError::InvalidCredentials,
            Err(e) => {
                error!(email, "failed-login bookkeeping failed: {e}");
                AuthError::InvalidCredentials
            }
        }
    }

    /// Exchange a refresh token for a new pair. Any token problem, or a
    /// subject that no longer exists, is `TokenInvalid`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let claims = self
            .tokens
            .validate_kind(strip_bearer(refresh_token), TokenKind::Refresh)
            .map_err(|e| {
                warn!("refresh rejected: {e}");
                AuthError::TokenInvalid
            })?;

        let principal = self
            .store
            .find_by_identifier(&claims.sub)
            .await?
            .filter(|p| p.id == claims.uid)
            .ok_or(AuthError::TokenInvalid)?;

        if self.lockout.is_locked(&principal) {
            return Err(AuthError::AccountLocked);
        }
        if !principal.enabled {
            return Err(AuthError::AccountDisabled);
        }

        info!(email = %principal.email, "tokens refreshed");
        let tokens = self.tokens.issue_pair(&principal)?;
        Ok(AuthSession {
            tokens,
            principal: principal.summary(),
        })
    }

    /// Replace the target's role set wholesale. Admin authority is enforced by
    /// the authorization policy before this is reached.
    pub async fn update_roles(
        &self,
        acting_admin: &str,
        target_email: &str,
        new_roles: BTreeSet<Role>,
    ) -> Result<PrincipalSummary, AuthError> {
        if new_roles.is_empty() {
            return Err(AuthError::ValidationFailed(
                "a principal must keep at least one role".into(),
            ));
        }
        let target = normalize_email(target_email);
        let now = self.clock.now();
        let roles = new_roles.clone();
        let updated = self
            .store
            .update(&target, &move |p: &mut Principal| {
                p.roles = roles.clone();
                p.updated_at = now;
            })
            .await?
            .ok_or_else(|| AuthError::PrincipalNotFound(target.clone()))?;

        info!(
            email = %target,
            admin = acting_admin,
            roles = ?new_roles,
            "roles updated"
        );
        Ok(updated.summary())
    }

    pub async fn profile(&self, email: &str) -> Result<PrincipalSummary, AuthError> {
        let email = normalize_email(email);
        self.store
            .find_by_identifier(&email)
            .await?
            .map(|p| p.summary())
            .ok_or(AuthError::PrincipalNotFound(email))
    }

    pub async fn unlock(&self, email: &str) -> Result<PrincipalSummary, AuthError> {
        Ok(self.lockout.force_unlock(&normalize_email(email)).await?.summary())
    }

    pub async fn disable(&self, email: &str) -> Result<PrincipalSummary, AuthError> {
        Ok(self.lockout.force_disable(&normalize_email(email)).await?.summary())
    }

    pub async fn enable(&self, email: &str) -> Result<PrincipalSummary, AuthError> {
        Ok(self.lockout.force_enable(&normalize_email(email)).await?.summary())
    }

    /// An undecodable token reports as expired with no expiry instant.
    pub fn token_status(&self, token: &str) -> TokenStatus {
        let token = strip_bearer(token);
        TokenStatus {
            expired: self.tokens.is_expired(token),
            expires_at: self.tokens.expires_at(token),
        }
    }
}
