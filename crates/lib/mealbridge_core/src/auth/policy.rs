//! Path-based role authorization.
//!
//! An ordered rule list evaluated first-match-wins, closed by a default deny.
//! Patterns use `*` for one path segment and `**` for any number of segments.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::gate::AuthenticatedPrincipal;
use crate::models::auth::Role;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path pattern {pattern:?}: {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`
    One,
    /// `**`
    Rest,
}

/// A request-path pattern such as `/api/mess/**` or `/api/*/profile`.
#[derive(Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError {
                pattern: pattern.to_string(),
                reason: "must start with '/'",
            });
        }
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s {
                "**" => Ok(Segment::Rest),
                "*" => Ok(Segment::One),
                s if s.contains('*') => Err(PatternError {
                    pattern: pattern.to_string(),
                    reason: "wildcards must fill a whole segment",
                }),
                s => Ok(Segment::Literal(s.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// Paths with `.` or `..` segments never match.
    pub fn matches(&self, path: &str) -> bool {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if parts.iter().any(|p| *p == "." || *p == "..") {
            return false;
        }
        match_segments(&self.segments, &parts)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::Rest, rest)) => (0..=path.len()).any(|i| match_segments(rest, &path[i..])),
        Some((Segment::One, rest)) => !path.is_empty() && match_segments(rest, &path[1..]),
        Some((Segment::Literal(lit), rest)) => {
            path.first().is_some_and(|p| p == lit) && match_segments(rest, &path[1..])
        }
    }
}

impl FromStr for PathPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathPattern({})", self.raw)
    }
}

/// How a rule's authority set is compared with the principal's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// At least one of the required authorities.
    Any,
    /// Every required authority.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Authorities {
        roles: BTreeSet<Role>,
        mode: MatchMode,
    },
    DenyAll,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: PathPattern,
    pub requirement: Requirement,
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Denied. Always surfaces as 403; 401 belongs to the gate.
    Deny(DenyReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// The rule requires authorities but no principal is authenticated.
    Anonymous,
    /// The principal lacks the required authorities.
    InsufficientAuthority,
    /// A deny rule (or the default deny) matched.
    DenyRule,
}

/// Ordered (pattern, authorities, mode) rules with a trailing default deny.
#[derive(Debug, Clone)]
pub struct AuthorizationPolicy {
    rules: Vec<Rule>,
}

impl AuthorizationPolicy {
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder { rules: Vec::new() }
    }

    /// Routes of the Meal Bridge API.
    pub fn default_rules() -> Result<Self, PatternError> {
        let admin_only = [Role::Admin];
        Ok(Self::builder()
            .require_any("/api/auth/roles", admin_only)?
            .require_any("/api/auth/unlock", admin_only)?
            .require_any("/api/auth/disable", admin_only)?
            .require_any("/api/auth/enable", admin_only)?
            .require_any("/api/auth/profile", Role::ALL)?
            .require_any("/api/mess/**", [Role::Admin, Role::Owner, Role::Assistant])?
            .require_any("/api/client/**", [Role::Client])?
            .build())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// First matching rule decides. A principal with no authorities never
    /// passes an authority rule.
    pub fn decide(&self, path: &str, principal: Option<&AuthenticatedPrincipal>) -> Decision {
        let Some(rule) = self.rules.iter().find(|r| r.pattern.matches(path)) else {
            return Decision::Deny(DenyReason::DenyRule);
        };
        match &rule.requirement {
            Requirement::DenyAll => Decision::Deny(DenyReason::DenyRule),
            Requirement::Authorities { roles, mode } => {
                let Some(principal) = principal else {
                    return Decision::Deny(DenyReason::Anonymous);
                };
                let held = &principal.authorities;
                let granted = !held.is_empty()
                    && match mode {
                        MatchMode::Any => roles.is_empty() || !roles.is_disjoint(held),
                        MatchMode::All => roles.is_subset(held),
                    };
                if granted {
                    Decision::Allow
                } else {
                    Decision::Deny(DenyReason::InsufficientAuthority)
                }
            }
        }
    }
}

pub struct PolicyBuilder {
    rules: Vec<Rule>,
}

impl PolicyBuilder {
    pub fn rule(
        mut self,
        pattern: &str,
        roles: impl IntoIterator<Item = Role>,
        mode: MatchMode,
    ) -> Result<Self, PatternError> {
        self.rules.push(Rule {
            pattern: PathPattern::parse(pattern)?,
            requirement: Requirement::Authorities {
                roles: roles.into_iter().collect(),
                mode,
            },
        });
        Ok(self)
    }

    pub fn require_any(
        self,
        pattern: &str,
        roles: impl IntoIterator<Item = Role>,
    ) -> Result<Self, PatternError> {
        self.rule(pattern, roles, MatchMode::Any)
    }

    pub fn require_all(
        self,
        pattern: &str,
        roles: impl IntoIterator<Item = Role>,
    ) -> Result<Self, PatternError> {
        self.rule(pattern, roles, MatchMode::All)
    }

    pub fn deny(mut self, pattern: &str) -> Result<Self, PatternError> {
        self.rules.push(Rule {
            pattern: PathPattern::parse(pattern)?,
            requirement: Requirement::DenyAll,
        });
        Ok(self)
    }

    /// Appends the default deny.
    pub fn build(mut self) -> AuthorizationPolicy {
        self.rules.push(Rule {
            pattern: PathPattern {
                raw: "/**".into(),
                segments: vec![Segment::Rest],
            },
            requirement: Requirement::DenyAll,
        });
        AuthorizationPolicy { rules: self.rules }
    }
}
