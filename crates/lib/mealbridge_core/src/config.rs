//! Security configuration: signing secret, token lifetimes, lockout policy.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use thiserror::Error;
use tracing::{info, warn};

/// Access token lifetime: 24 hours.
pub const DEFAULT_ACCESS_TTL_MS: i64 = 86_400_000;

/// Refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TTL_MS: i64 = 604_800_000;

/// Consecutive failures that lock an account.
pub const DEFAULT_LOCKOUT_THRESHOLD: u32 = 5;

/// Lock duration: 30 minutes.
pub const DEFAULT_LOCKOUT_DURATION_MS: i64 = 1_800_000;

/// Minimum gap between two last-login writes triggered by the request gate.
pub const DEFAULT_LAST_LOGIN_TOUCH_INTERVAL_MS: i64 = 900_000;

/// bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Process-wide security settings, read once at startup.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC signing secret.
    pub signing_secret: String,
    pub access_ttl_ms: i64,
    pub refresh_ttl_ms: i64,
    pub lockout_threshold: u32,
    pub lockout_duration_ms: i64,
    pub last_login_touch_interval_ms: i64,
    pub bcrypt_cost: u32,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("signing_secret", &"<redacted>")
            .field("access_ttl_ms", &self.access_ttl_ms)
            .field("refresh_ttl_ms", &self.refresh_ttl_ms)
            .field("lockout_threshold", &self.lockout_threshold)
            .field("lockout_duration_ms", &self.lockout_duration_ms)
            .field("last_login_touch_interval_ms", &self.last_login_touch_interval_ms)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

impl AuthConfig {
    /// Defaults with the given secret.
    pub fn with_secret(signing_secret: impl Into<String>) -> Self {
        Self {
            signing_secret: signing_secret.into(),
            access_ttl_ms: DEFAULT_ACCESS_TTL_MS,
            refresh_ttl_ms: DEFAULT_REFRESH_TTL_MS,
            lockout_threshold: DEFAULT_LOCKOUT_THRESHOLD,
            lockout_duration_ms: DEFAULT_LOCKOUT_DURATION_MS,
            last_login_touch_interval_ms: DEFAULT_LAST_LOGIN_TOUCH_INTERVAL_MS,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }

    /// Reads configuration from environment variables.
    ///
    /// | Variable                       | Default                       |
    /// |--------------------------------|-------------------------------|
    /// | `JWT_SECRET` / `AUTH_SECRET`   | generated & persisted to file |
    /// | `JWT_ACCESS_TTL_MS`            | `86400000`                    |
    /// | `JWT_REFRESH_TTL_MS`           | `604800000`                   |
    /// | `LOCKOUT_THRESHOLD`            | `5`                           |
    /// | `LOCKOUT_DURATION_MS`          | `1800000`                     |
    /// | `LAST_LOGIN_TOUCH_INTERVAL_MS` | `900000`                      |
    /// | `BCRYPT_COST`                  | `10`                          |
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            signing_secret: resolve_signing_secret(),
            access_ttl_ms: env_or("JWT_ACCESS_TTL_MS", DEFAULT_ACCESS_TTL_MS)?,
            refresh_ttl_ms: env_or("JWT_REFRESH_TTL_MS", DEFAULT_REFRESH_TTL_MS)?,
            lockout_threshold: env_or("LOCKOUT_THRESHOLD", DEFAULT_LOCKOUT_THRESHOLD)?,
            lockout_duration_ms: env_or("LOCKOUT_DURATION_MS", DEFAULT_LOCKOUT_DURATION_MS)?,
            last_login_touch_interval_ms: env_or(
                "LAST_LOGIN_TOUCH_INTERVAL_MS",
                DEFAULT_LAST_LOGIN_TOUCH_INTERVAL_MS,
            )?,
            bcrypt_cost: env_or("BCRYPT_COST", DEFAULT_BCRYPT_COST)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing_secret.is_empty() {
            return Err(ConfigError::Invalid("signing secret is empty".into()));
        }
        for (name, ttl) in [
            ("access TTL", self.access_ttl_ms),
            ("refresh TTL", self.refresh_ttl_ms),
        ] {
            if ttl <= 0 || ttl % 1000 != 0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive whole number of seconds, got {ttl} ms"
                )));
            }
        }
        if self.refresh_ttl_ms <= self.access_ttl_ms {
            return Err(ConfigError::Invalid(
                "refresh TTL must be longer than access TTL".into(),
            ));
        }
        if self.lockout_threshold == 0 {
            return Err(ConfigError::Invalid("lockout threshold must be at least 1".into()));
        }
        if self.lockout_duration_ms <= 0 {
            return Err(ConfigError::Invalid("lockout duration must be positive".into()));
        }
        if self.last_login_touch_interval_ms < 0 {
            return Err(ConfigError::Invalid(
                "last-login touch interval must not be negative".into(),
            ));
        }
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigError::Invalid(format!(
                "bcrypt cost must be between 4 and 31, got {}",
                self.bcrypt_cost
            )));
        }
        Ok(())
    }

    pub fn access_ttl(&self) -> Duration {
        Duration::milliseconds(self.access_ttl_ms)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::milliseconds(self.refresh_ttl_ms)
    }

    pub fn lockout_duration(&self) -> Duration {
        Duration::milliseconds(self.lockout_duration_ms)
    }

    pub fn last_login_touch_interval(&self) -> Duration {
        Duration::milliseconds(self.last_login_touch_interval_ms)
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        _ => Ok(default),
    }
}

/// Resolve the signing secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_signing_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = signing_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    match std::fs::write(&secret_path, &secret) {
        Ok(()) => info!(path = %secret_path.display(), "generated new signing secret"),
        Err(e) => warn!(path = %secret_path.display(), "could not persist signing secret: {e}"),
    }
    secret
}

/// Path to the persisted signing secret file.
fn signing_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mealbridge")
        .join("jwt-secret")
}
