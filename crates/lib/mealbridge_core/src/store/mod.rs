//! Principal persistence.
//!
//! The store exclusively owns principal state. Every change goes through
//! [`CredentialStore::update`], which applies a mutation as one atomic
//! read-modify-write so concurrent updates to the same identity never lose
//! writes.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::auth::Principal;

pub use memory::InMemoryCredentialStore;
pub use postgres::PgCredentialStore;

/// In-place change to a principal. Must not alter `id`, `email` or `phone`.
pub type Mutation<'a> = &'a (dyn Fn(&mut Principal) + Send + Sync);

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Identity already registered: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Internal(String),
}

/// Lookup and persistence of principals by identifier (email).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch a principal by normalized email.
    async fn find_by_identifier(&self, email: &str) -> Result<Option<Principal>, StoreError>;

    /// Whether the email, or the phone when given, is already taken.
    async fn identity_exists(&self, email: &str, phone: Option<&str>) -> Result<bool, StoreError>;

    /// Persist a new principal. Fails with [`StoreError::Duplicate`] without
    /// writing anything if the email or phone collides.
    async fn insert(&self, principal: Principal) -> Result<Principal, StoreError>;

    /// Atomically load, mutate, and persist the principal. Returns the
    /// updated principal, or `None` if no principal has this email.
    async fn update(
        &self,
        email: &str,
        mutation: Mutation<'_>,
    ) -> Result<Option<Principal>, StoreError>;

    /// Total number of principals.
    async fn count(&self) -> Result<u64, StoreError>;
}
