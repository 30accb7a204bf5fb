//! In-process credential store.
//!
//! Per-identity updates are serialized by the dashmap shard lock held for the
//! duration of the mutation.

use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;

use super::{CredentialStore, Mutation, StoreError};
use crate::models::auth::Principal;

/// Principals keyed by email, with a secondary phone index.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    principals: DashMap<String, Principal>,
    phones: DashMap<String, String>,
    /// Serializes inserts so the email and phone uniqueness checks are atomic
    /// with the write.
    insert_lock: Mutex<()>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_identifier(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        Ok(self.principals.get(email).map(|p| p.value().clone()))
    }

    async fn identity_exists(&self, email: &str, phone: Option<&str>) -> Result<bool, StoreError> {
        Ok(self.principals.contains_key(email)
            || phone.is_some_and(|p| self.phones.contains_key(p)))
    }

    async fn insert(&self, principal: Principal) -> Result<Principal, StoreError> {
        let _guard = self
            .insert_lock
            .lock()
            .map_err(|_| StoreError::Internal("insert lock poisoned".into()))?;

        if self.principals.contains_key(&principal.email) {
            return Err(StoreError::Duplicate(principal.email));
        }
        if let Some(phone) = &principal.phone
            && self.phones.contains_key(phone)
        {
            return Err(StoreError::Duplicate(phone.clone()));
        }

        if let Some(phone) = &principal.phone {
            self.phones.insert(phone.clone(), principal.email.clone());
        }
        self.principals
            .insert(principal.email.clone(), principal.clone());
        Ok(principal)
    }

    async fn update(
        &self,
        email: &str,
        mutation: Mutation<'_>,
    ) -> Result<Option<Principal>, StoreError> {
        let Some(mut entry) = self.principals.get_mut(email) else {
            return Ok(None);
        };

        let mut next = entry.value().clone();
        mutation(&mut next);
        let current = entry.value();
        if next.id != current.id || next.email != current.email || next.phone != current.phone {
            return Err(StoreError::Internal(
                "mutation attempted to change principal identity".into(),
            ));
        }

        *entry.value_mut() = next.clone();
        Ok(Some(next))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.principals.len() as u64)
    }
}
