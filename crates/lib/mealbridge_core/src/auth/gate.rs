//! Per-request authentication gate.
//!
//! One pass per request: public allowlist → bearer token → signature and
//! expiry → principal lookup → lock/disable check → identity for the
//! authorization stage. Only a presented-but-bad token fails the request
//! here; every other miss continues anonymously and is left to the policy.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};
use uuid::Uuid;

use super::jwt::{TokenError, TokenService, strip_bearer};
use super::lockout::LockoutPolicy;
use super::policy::{PathPattern, PatternError};
use crate::clock::Clock;
use crate::models::auth::{PrincipalSummary, Role, TokenKind};
use crate::store::CredentialStore;

/// Identity installed into the request context by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    pub id: Uuid,
    pub email: String,
    /// Token role snapshot, narrowed to roles the principal still holds.
    pub authorities: BTreeSet<Role>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub summary: PrincipalSummary,
}

impl AuthenticatedPrincipal {
    pub fn has_authority(&self, role: Role) -> bool {
        self.authorities.contains(&role)
    }
}

/// Paths that skip authentication and authorization entirely.
#[derive(Debug, Clone, Default)]
pub struct PublicPaths {
    patterns: Vec<PathPattern>,
}

impl PublicPaths {
    pub fn new(patterns: Vec<PathPattern>) -> Self {
        Self { patterns }
    }

    /// Auth entry points, health, docs, and static assets.
    pub fn defaults() -> Result<Self, PatternError> {
        let patterns = [
            "/api/auth/register",
            "/api/auth/login",
            "/api/auth/refresh",
            "/api/auth/token-status",
            "/api/health",
            "/api/public/**",
            "/swagger-ui/**",
            "/v3/api-docs/**",
            "/favicon.ico",
        ]
        .into_iter()
        .map(PathPattern::parse)
        .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}

/// Result of running the gate on one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Allowlisted path; no identity and no authorization check.
    Public,
    /// No usable identity; authorization decides.
    Anonymous,
    Authenticated(AuthenticatedPrincipal),
}

pub struct AuthenticationGate {
    tokens: Arc<TokenService>,
    store: Arc<dyn CredentialStore>,
    lockout: Arc<LockoutPolicy>,
    public: PublicPaths,
    clock: Arc<dyn Clock>,
}

impl AuthenticationGate {
    pub fn new(
        tokens: Arc<TokenService>,
        store: Arc<dyn CredentialStore>,
        lockout: Arc<LockoutPolicy>,
        public: PublicPaths,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            tokens,
            store,
            lockout,
            public,
            clock,
        }
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public.is_public(path)
    }

    /// Run the gate. `authorization` is the raw `Authorization` header value.
    ///
    /// Errors only when a token was presented and failed to decode, verify,
    /// or was expired; callers answer those with 401.
    pub async fn authenticate(
        &self,
        path: &str,
        authorization: Option<&str>,
    ) -> Result<GateOutcome, TokenError> {
        if self.public.is_public(path) {
            debug!(path, "public path, skipping authentication");
            return Ok(GateOutcome::Public);
        }

        let Some(token) = authorization.map(strip_bearer).filter(|t| !t.is_empty()) else {
            debug!(path, "no bearer token");
            return Ok(GateOutcome::Anonymous);
        };

        let claims = self
            .tokens
            .validate_kind(token, TokenKind::Access)
            .inspect_err(|e| debug!(path, "bearer token rejected: {e}"))?;

        let principal = match self.store.find_by_identifier(&claims.sub).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                debug!(path, subject = %claims.sub, "token subject no longer exists");
                return Ok(GateOutcome::Anonymous);
            }
            Err(e) => {
                error!(path, subject = %claims.sub, "principal lookup failed: {e}");
                return Ok(GateOutcome::Anonymous);
            }
        };

        if principal.id != claims.uid {
            warn!(path, subject = %claims.sub, "token issued to a previous holder of this email");
            return Ok(GateOutcome::Anonymous);
        }

        if !principal.can_authenticate(self.clock.now()) {
            debug!(path, subject = %claims.sub, "principal is locked or disabled");
            return Ok(GateOutcome::Anonymous);
        }

        let authorities = claims
            .role_set()
            .intersection(&principal.roles)
            .copied()
            .collect();

        if let Err(e) = self.lockout.touch_last_login(&principal).await {
            error!(subject = %claims.sub, "last-login bookkeeping failed: {e}");
        }

        debug!(path, subject = %claims.sub, "authenticated");
        Ok(GateOutcome::Authenticated(AuthenticatedPrincipal {
            id: principal.id,
            email: principal.email.clone(),
            authorities,
            token_expires_at: claims.expires_at(),
            summary: principal.summary(),
        }))
    }
}
