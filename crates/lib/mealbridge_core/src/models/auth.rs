//! Authentication domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! shapes in `mealbridge_api::models` (which carry camelCase renames).

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named authority checked by the authorization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Owner,
    Assistant,
    Client,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Owner, Role::Assistant, Role::Client];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Owner => "OWNER",
            Role::Assistant => "ASSISTANT",
            Role::Client => "CLIENT",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    /// Accepts `ADMIN`, `admin` and the `ROLE_ADMIN` authority form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix("ROLE_").unwrap_or(&upper);
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == name)
            .ok_or_else(|| format!("unknown role: {s}"))
    }
}

/// The two kinds of account that share one token format and one gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    Client,
    Owner,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::Client => "client",
            PrincipalKind::Owner => "owner",
        }
    }

    /// Role set granted at registration.
    pub fn default_roles(&self) -> BTreeSet<Role> {
        match self {
            PrincipalKind::Client => BTreeSet::from([Role::Client]),
            PrincipalKind::Owner => BTreeSet::from([Role::Owner]),
        }
    }
}

impl FromStr for PrincipalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(PrincipalKind::Client),
            "owner" => Ok(PrincipalKind::Owner),
            other => Err(format!("unknown principal kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
            Gender::Other => "OTHER",
        }
    }

    pub fn salutation(&self) -> &'static str {
        match self {
            Gender::Male => "Mr.",
            Gender::Female => "Ms.",
            Gender::Other => "Mx.",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MALE" => Ok(Gender::Male),
            "FEMALE" => Ok(Gender::Female),
            "OTHER" => Ok(Gender::Other),
            other => Err(format!("unknown gender: {other}")),
        }
    }
}

/// Non-credential details supplied at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<Gender>,
    /// Date of birth.
    pub dob: Option<NaiveDate>,
}

/// An authenticatable actor.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub kind: PrincipalKind,
    /// Lower-cased, trimmed. Also the token subject.
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub roles: BTreeSet<Role>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<Gender>,
    pub dob: Option<NaiveDate>,
    pub salutation: Option<String>,
    pub enabled: bool,
    pub locked_until: Option<DateTime<Utc>>,
    pub failed_attempt_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Principal {
    /// True iff `locked_until` is set and still in the future. A lock whose
    /// instant has passed counts as released without anyone clearing it.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// Locked or disabled principals cannot authenticate.
    pub fn can_authenticate(&self, now: DateTime<Utc>) -> bool {
        self.enabled && !self.is_locked(now)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn summary(&self) -> PrincipalSummary {
        PrincipalSummary {
            id: self.id,
            kind: self.kind,
            email: self.email.clone(),
            phone: self.phone.clone(),
            roles: self.roles.iter().copied().collect(),
            first_name: self.first_name.clone(),
            middle_name: self.middle_name.clone(),
            last_name: self.last_name.clone(),
            dob: self.dob,
            salutation: self.salutation.clone(),
            enabled: self.enabled,
            locked_until: self.locked_until,
            created_at: self.created_at,
            last_login_at: self.last_login_at,
        }
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .field("enabled", &self.enabled)
            .field("locked_until", &self.locked_until)
            .field("failed_attempt_count", &self.failed_attempt_count)
            .field("password_hash", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// Read-only view of a principal, safe to hand to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrincipalSummary {
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

/// Access tokens authorize requests; refresh tokens only mint new pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// JWT claims shared by access and refresh tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject — the principal's email (standard JWT `sub` claim).
    pub sub: String,
    /// Stable principal id.
    pub uid: Uuid,
    /// Role snapshot taken at issuance.
    pub roles: Vec<Role>,
    pub kind: TokenKind,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds). Always `iat` + the TTL of `kind`.
    pub exp: i64,
}

impl TokenClaims {
    pub fn role_set(&self) -> BTreeSet<Role> {
        self.roles.iter().copied().collect()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

/// A freshly issued access + refresh pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Result of a register, login, or refresh.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub tokens: TokenPair,
    pub principal: PrincipalSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn principal(locked_until: Option<DateTime<Utc>>, enabled: bool) -> Principal {
        let now = Utc::now();
        Principal {
            id: Uuid::nil(),
            kind: PrincipalKind::Client,
            email: "a@x.com".into(),
            phone: None,
            password_hash: "hash".into(),
            roles: BTreeSet::from([Role::Client]),
            first_name: None,
            middle_name: None,
            last_name: None,
            gender: None,
            dob: None,
            salutation: None,
            enabled,
            locked_until,
            failed_attempt_count: 0,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        }
    }

    #[test]
    fn role_parses_authority_forms() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("role_owner".parse::<Role>().unwrap(), Role::Owner);
        assert_eq!(" client ".parse::<Role>().unwrap(), Role::Client);
        assert!("ROOT".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_as_upper_name() {
        let json = serde_json::to_string(&vec![Role::Admin, Role::Assistant]).unwrap();
        assert_eq!(json, r#"["ADMIN","ASSISTANT"]"#);
    }

    #[test]
    fn past_lock_is_not_locked() {
        let now = Utc::now();
        let p = principal(Some(now - Duration::seconds(1)), true);
        assert!(!p.is_locked(now));
        assert!(p.can_authenticate(now));
    }

    #[test]
    fn future_lock_blocks_even_when_enabled() {
        let now = Utc::now();
        let p = principal(Some(now + Duration::minutes(5)), true);
        assert!(p.is_locked(now));
        assert!(!p.can_authenticate(now));
    }

    #[test]
    fn lock_instant_itself_is_unlocked() {
        let now = Utc::now();
        let p = principal(Some(now), true);
        assert!(!p.is_locked(now));
    }

    #[test]
    fn disabled_cannot_authenticate() {
        let p = principal(None, false);
        assert!(!p.can_authenticate(Utc::now()));
    }

    #[test]
    fn debug_redacts_password_hash() {
        let p = principal(None, true);
        let dbg = format!("{p:?}");
        assert!(!dbg.contains("\"hash\""));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn owner_salutation_follows_gender() {
        assert_eq!(Gender::Male.salutation(), "Mr.");
        assert_eq!(Gender::Female.salutation(), "Ms.");
        assert_eq!(Gender::Other.salutation(), "Mx.");
    }
}
