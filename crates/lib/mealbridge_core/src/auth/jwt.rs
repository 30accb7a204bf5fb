//! Signed token issuance and validation (HS256).
//!
//! Access and refresh tokens share one key and one claim shape; the `kind`
//! claim tells them apart and every use site checks it.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::models::auth::{Principal, TokenClaims, TokenKind, TokenPair};

const BEARER_PREFIX: &str = "Bearer ";

/// Token errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token could not be decoded")]
    Malformed,

    #[error("token expired")]
    Expired,

    #[error("token signature is invalid")]
    Invalid,

    #[error("expected a {expected} token, got {found}")]
    WrongKind { expected: TokenKind, found: TokenKind },

    #[error("jwt encode: {0}")]
    Encode(String),
}

/// HMAC key derived once from the configured secret. Immutable for the
/// lifetime of the process.
pub struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// Accept either a raw token or one carrying the `Bearer ` prefix.
pub fn strip_bearer(token: &str) -> &str {
    let token = token.trim();
    token.strip_prefix(BEARER_PREFIX).unwrap_or(token).trim()
}

#[derive(Deserialize)]
struct ExpiryOnly {
    exp: i64,
}

/// Issues and validates time-bounded tokens. Stateless; safe to share.
#[derive(Clone)]
pub struct TokenService {
    key: Arc<SigningKey>,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(config: &AuthConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            key: Arc::new(SigningKey::from_secret(config.signing_secret.as_bytes())),
            access_ttl_secs: config.access_ttl().num_seconds(),
            refresh_ttl_secs: config.refresh_ttl().num_seconds(),
            clock,
        }
    }

    pub fn ttl_secs(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock, not the system time.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);
        validation
    }

    /// Sign a token of `kind` for the principal, snapshotting its roles.
    pub fn issue(&self, principal: &Principal, kind: TokenKind) -> Result<String, TokenError> {
        let iat = self.clock.now().timestamp();
        self.sign(principal, kind, iat).map(|(token, _)| token)
    }

    fn sign(
        &self,
        principal: &Principal,
        kind: TokenKind,
        iat: i64,
    ) -> Result<(String, TokenClaims), TokenError> {
        let claims = TokenClaims {
            sub: principal.email.clone(),
            uid: principal.id,
            roles: principal.roles.iter().copied().collect(),
            kind,
            iat,
            exp: iat + self.ttl_secs(kind),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.key.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))?;
        Ok((token, claims))
    }

    /// Issue a fresh access + refresh pair sharing one issued-at. The
    /// reported expiry instants are the ones signed into the tokens.
    pub fn issue_pair(&self, principal: &Principal) -> Result<TokenPair, TokenError> {
        let iat = self.clock.now().timestamp();
        let (access_token, access) = self.sign(principal, TokenKind::Access, iat)?;
        let (refresh_token, refresh) = self.sign(principal, TokenKind::Refresh, iat)?;
        let out_of_range = || TokenError::Encode("expiry out of range".into());
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl_secs,
            access_expires_at: access.expires_at().ok_or_else(out_of_range)?,
            refresh_expires_at: refresh.expires_at().ok_or_else(out_of_range)?,
        })
    }

    /// Verify the signature and expiry, returning the claims.
    pub fn validate(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let token = strip_bearer(token);
        let claims = decode::<TokenClaims>(token, &self.key.decoding, &self.validation())
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("token rejected: {e}");
                match e.kind() {
                    ErrorKind::InvalidSignature
                    | ErrorKind::InvalidAlgorithm
                    | ErrorKind::InvalidAlgorithmName => TokenError::Invalid,
                    _ => TokenError::Malformed,
                }
            })?;
        if claims.exp <= self.clock.now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// [`validate`](Self::validate), then require a specific kind.
    pub fn validate_kind(&self, token: &str, expected: TokenKind) -> Result<TokenClaims, TokenError> {
        let claims = self.validate(token)?;
        if claims.kind != expected {
            return Err(TokenError::WrongKind {
                expected,
                found: claims.kind,
            });
        }
        Ok(claims)
    }

    /// Decoded expiry instant, without verifying the signature.
    pub fn expires_at(&self, token: &str) -> Option<DateTime<Utc>> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);
        decode::<ExpiryOnly>(strip_bearer(token), &DecodingKey::from_secret(&[]), &validation)
            .ok()
            .and_then(|data| DateTime::from_timestamp(data.claims.exp, 0))
    }

    /// Pure time comparison against the decoded expiry. A token whose expiry
    /// cannot be read is reported as expired.
    pub fn is_expired(&self, token: &str) -> bool {
        match self.expires_at(token) {
            Some(exp) => exp <= self.clock.now(),
            None => true,
        }
    }

    /// A token is valid for a principal when it verifies, has NOT expired,
    /// and its subject is that principal.
    pub fn is_valid_for(&self, token: &str, principal: &Principal) -> bool {
        match self.validate(token) {
            Ok(claims) => claims.sub == principal.email && claims.uid == principal.id,
            Err(_) => false,
        }
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}
