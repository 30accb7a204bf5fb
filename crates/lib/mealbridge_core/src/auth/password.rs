//! Password hashing via bcrypt, and the registration password policy.
//!
//! Hashing runs on the blocking pool: it is deliberately slow and, once
//! started, runs to completion even if the caller goes away.

use super::AuthError;

/// Symbols that satisfy the "one special character" rule.
pub const PASSWORD_SYMBOLS: &str = "@$!%*#?&";

/// Minimum password length.
pub const PASSWORD_MIN_LEN: usize = 8;

/// One-way credential hashing.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password with bcrypt at the configured cost.
    pub async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_owned();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|e| AuthError::Internal(format!("bcrypt task: {e}")))?
            .map_err(|e| AuthError::Internal(format!("bcrypt hash: {e}")))
    }

    /// Verify a password against a bcrypt hash.
    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("bcrypt task: {e}")))?
            .map_err(|e| AuthError::Internal(format!("bcrypt verify: {e}")))
    }
}

/// At least 8 characters with a letter, a digit, and one of [`PASSWORD_SYMBOLS`].
pub fn check_password_strength(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(AuthError::WeakPassword(format!(
            "must be at least {PASSWORD_MIN_LEN} characters"
        )));
    }
    if !password.chars().any(|c| c.is_ascii_alphabetic()) {
        return Err(AuthError::WeakPassword("must contain a letter".into()));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::WeakPassword("must contain a digit".into()));
    }
    if !password.chars().any(|c| PASSWORD_SYMBOLS.contains(c)) {
        return Err(AuthError::WeakPassword(format!(
            "must contain one of {PASSWORD_SYMBOLS}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_and_verify() {
        let hasher = PasswordHasher::new(4);
        let hash = hasher.hash("Abc12345!").await.unwrap();
        assert_ne!(hash, "Abc12345!");
        assert!(hasher.verify("Abc12345!", &hash).await.unwrap());
        assert!(!hasher.verify("wrong", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn verify_against_garbage_hash_errors() {
        let hasher = PasswordHasher::new(4);
        assert!(hasher.verify("Abc12345!", "not-a-hash").await.is_err());
    }

    #[test]
    fn strong_password_accepted() {
        assert!(check_password_strength("Abc12345!").is_ok());
        assert!(check_password_strength("p@ssw0rd").is_ok());
    }

    #[test]
    fn weak_passwords_rejected() {
        for pw in ["Ab1!", "abcdefgh!", "12345678!", "Abc123456", ""] {
            assert!(
                matches!(check_password_strength(pw), Err(AuthError::WeakPassword(_))),
                "{pw:?} should be rejected"
            );
        }
    }

    #[test]
    fn symbol_must_come_from_fixed_set() {
        assert!(check_password_strength("Abc12345^").is_err());
        assert!(check_password_strength("Abc12345&").is_ok());
    }
}
