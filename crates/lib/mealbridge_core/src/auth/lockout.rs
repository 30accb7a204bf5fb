//! Account lockout after repeated failed logins.
//!
//! `UNLOCKED` → (threshold-th consecutive failure) → `LOCKED(until)` →
//! (time passes, or admin unlock) → `UNLOCKED`. Expiry is lazy: a lock whose
//! instant has passed is simply ignored until the next success clears it.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use super::AuthError;
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::models::auth::Principal;
use crate::store::CredentialStore;

/// Failed-attempt counters, lock expiry, and administrative overrides.
pub struct LockoutPolicy {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    threshold: u32,
    duration: Duration,
    touch_interval: Duration,
}

impl LockoutPolicy {
    pub fn new(config: &AuthConfig, store: Arc<dyn CredentialStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            threshold: config.lockout_threshold,
            duration: config.lockout_duration(),
            touch_interval: config.last_login_touch_interval(),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// True iff the principal's lock instant is still in the future.
    pub fn is_locked(&self, principal: &Principal) -> bool {
        principal.is_locked(self.clock.now())
    }

    /// Count a failed credential check. Locks the account once the counter
    /// reaches the threshold; the counter is not reset by locking.
    ///
    /// A principal that is already locked when the write lands is left
    /// untouched, so failures racing past a lock do not extend it.
    ///
    /// Returns `None` if the principal does not exist.
    pub async fn record_failure(&self, email: &str) -> Result<Option<Principal>, AuthError> {
        let now = self.clock.now();
        let until = now + self.duration;
        let threshold = self.threshold;
        let updated = self
            .store
            .update(email, &move |p: &mut Principal| {
                if p.is_locked(now) {
                    return;
                }
                p.failed_attempt_count = p.failed_attempt_count.saturating_add(1);
                if p.failed_attempt_count >= threshold {
                    p.locked_until = Some(until);
                }
                p.updated_at = now;
            })
            .await?;

        if let Some(p) = &updated {
            if p.locked_until == Some(until) {
                warn!(
                    email,
                    attempts = p.failed_attempt_count,
                    locked_until = %until,
                    "account locked after failed logins"
                );
            } else if p.is_locked(now) {
                warn!(email, "failed login against a locked account");
            } else {
                warn!(email, attempts = p.failed_attempt_count, "failed login attempt");
            }
        }
        Ok(updated)
    }

    /// Reset the counter, clear the lock, and stamp `last_login_at`.
    ///
    /// The lock is re-checked inside the atomic update: if the principal was
    /// locked after the caller's snapshot was taken, nothing is written and
    /// the result is `AccountLocked`.
    pub async fn record_success(&self, email: &str) -> Result<Option<Principal>, AuthError> {
        let now = self.clock.now();
        let updated = self
            .store
            .update(email, &move |p: &mut Principal| {
                if p.is_locked(now) {
                    return;
                }
                p.failed_attempt_count = 0;
                p.locked_until = None;
                p.last_login_at = Some(now);
                p.updated_at = now;
            })
            .await?;
        match updated {
            Some(p) if p.is_locked(now) => {
                warn!(email, "login rejected: account locked during verification");
                Err(AuthError::AccountLocked)
            }
            other => Ok(other),
        }
    }

    /// Rate-limited [`record_success`](Self::record_success) for requests that
    /// merely carry a valid token. Writes only when the previous login stamp is
    /// older than the touch interval and the principal is not locked.
    ///
    /// Returns whether a write happened.
    pub async fn touch_last_login(&self, principal: &Principal) -> Result<bool, AuthError> {
        let now = self.clock.now();
        if !self.touch_due(principal, now) {
            return Ok(false);
        }
        let interval = self.touch_interval;
        let updated = self
            .store
            .update(&principal.email, &move |p: &mut Principal| {
                let due = p.last_login_at.is_none_or(|at| now - at >= interval);
                if due && !p.is_locked(now) {
                    p.failed_attempt_count = 0;
                    p.locked_until = None;
                    p.last_login_at = Some(now);
                    p.updated_at = now;
                }
            })
            .await?;
        Ok(updated.is_some_and(|p| p.last_login_at == Some(now)))
    }

    fn touch_due(&self, principal: &Principal, now: chrono::DateTime<chrono::Utc>) -> bool {
        principal
            .last_login_at
            .is_none_or(|at| now - at >= self.touch_interval)
    }

    /// Clear the lock and reset the failure counter.
    pub async fn force_unlock(&self, email: &str) -> Result<Principal, AuthError> {
        let now = self.clock.now();
        let updated = self
            .store
            .update(email, &move |p: &mut Principal| {
                p.failed_attempt_count = 0;
                p.locked_until = None;
                p.updated_at = now;
            })
            .await?
            .ok_or_else(|| AuthError::PrincipalNotFound(email.to_string()))?;
        info!(email, "account unlocked");
        Ok(updated)
    }

    /// Disable the account regardless of the failure counter.
    pub async fn force_disable(&self, email: &str) -> Result<Principal, AuthError> {
        let updated = self.set_enabled(email, false).await?;
        info!(email, "account disabled");
        Ok(updated)
    }

    pub async fn force_enable(&self, email: &str) -> Result<Principal, AuthError> {
        let updated = self.set_enabled(email, true).await?;
        info!(email, "account enabled");
        Ok(updated)
    }

    async fn set_enabled(&self, email: &str, enabled: bool) -> Result<Principal, AuthError> {
        let now = self.clock.now();
        self.store
            .update(email, &move |p: &mut Principal| {
                p.enabled = enabled;
                p.updated_at = now;
            })
            .await?
            .ok_or_else(|| AuthError::PrincipalNotFound(email.to_string()))
    }
}
