//! PostgreSQL-backed credential store.
//!
//! Updates run inside a transaction holding a `FOR UPDATE` row lock, so two
//! concurrent failed logins against the same email are applied one after the
//! other.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{CredentialStore, Mutation, StoreError};
use crate::models::auth::{Principal, Role};

const SELECT_COLUMNS: &str = "id, kind, email, phone, password_hash, roles, first_name, \
     middle_name, last_name, gender, dob, salutation, enabled, locked_until, \
     failed_attempt_count, created_at, updated_at, last_login_at";

#[derive(Debug, sqlx::FromRow)]
struct PrincipalRow {
    id: Uuid,
    kind: String,
    email: String,
    phone: Option<String>,
    password_hash: String,
    roles: Vec<String>,
    first_name: Option<String>,
    middle_name: Option<String>,
    last_name: Option<String>,
    gender: Option<String>,
    dob: Option<NaiveDate>,
    salutation: Option<String>,
    enabled: bool,
    locked_until: Option<DateTime<Utc>>,
    failed_attempt_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = StoreError;

    fn try_from(row: PrincipalRow) -> Result<Self, Self::Error> {
        let roles: BTreeSet<Role> = row
            .roles
            .iter()
            .map(|r| r.parse::<Role>())
            .collect::<Result<_, _>>()
            .map_err(StoreError::Internal)?;
        Ok(Principal {
            id: row.id,
            kind: row.kind.parse().map_err(StoreError::Internal)?,
            email: row.email,
            phone: row.phone,
            password_hash: row.password_hash,
            roles,
            first_name: row.first_name,
            middle_name: row.middle_name,
            last_name: row.last_name,
            gender: row
                .gender
                .map(|g| g.parse())
                .transpose()
                .map_err(StoreError::Internal)?,
            dob: row.dob,
            salutation: row.salutation,
            enabled: row.enabled,
            locked_until: row.locked_until,
            failed_attempt_count: u32::try_from(row.failed_attempt_count).unwrap_or(0),
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_login_at: row.last_login_at,
        })
    }
}

fn role_names(principal: &Principal) -> Vec<String> {
    principal.roles.iter().map(|r| r.as_str().to_string()).collect()
}

fn attempt_count(principal: &Principal) -> i32 {
    i32::try_from(principal.failed_attempt_count).unwrap_or(i32::MAX)
}

/// Create or upgrade the `principals` schema. Migrations are embedded from
/// `mealbridge_core/migrations/`.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Credential store over the `principals` table.
#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_identifier(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM principals WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Principal::try_from).transpose()
    }

    async fn identity_exists(&self, email: &str, phone: Option<&str>) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM principals \
             WHERE email = $1 OR ($2::text IS NOT NULL AND phone = $2))",
        )
        .bind(email)
        .bind(phone)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert(&self, principal: Principal) -> Result<Principal, StoreError> {
        let result = sqlx::query(
            "INSERT INTO principals (id, kind, email, phone, password_hash, roles, first_name, \
             middle_name, last_name, gender, dob, salutation, enabled, locked_until, \
             failed_attempt_count, created_at, updated_at, last_login_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18)",
        )
        .bind(principal.id)
        .bind(principal.kind.as_str())
        .bind(&principal.email)
        .bind(&principal.phone)
        .bind(&principal.password_hash)
        .bind(role_names(&principal))
        .bind(&principal.first_name)
        .bind(&principal.middle_name)
        .bind(&principal.last_name)
        .bind(principal.gender.map(|g| g.as_str()))
        .bind(principal.dob)
        .bind(&principal.salutation)
        .bind(principal.enabled)
        .bind(principal.locked_until)
        .bind(attempt_count(&principal))
        .bind(principal.created_at)
        .bind(principal.updated_at)
        .bind(principal.last_login_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(principal),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Duplicate(principal.email))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(
        &self,
        email: &str,
        mutation: Mutation<'_>,
    ) -> Result<Option<Principal>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM principals WHERE email = $1 FOR UPDATE"
        ))
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let current = Principal::try_from(row)?;
        let mut next = current.clone();
        mutation(&mut next);
        if next.id != current.id || next.email != current.email || next.phone != current.phone {
            tx.rollback().await?;
            return Err(StoreError::Internal(
                "mutation attempted to change principal identity".into(),
            ));
        }

        sqlx::query(
            "UPDATE principals SET roles = $2, first_name = $3, middle_name = $4, \
             last_name = $5, gender = $6, salutation = $7, enabled = $8, locked_until = $9, \
             failed_attempt_count = $10, updated_at = $11, last_login_at = $12, \
             password_hash = $13, dob = $14 \
             WHERE id = $1",
        )
        .bind(next.id)
        .bind(role_names(&next))
        .bind(&next.first_name)
        .bind(&next.middle_name)
        .bind(&next.last_name)
        .bind(next.gender.map(|g| g.as_str()))
        .bind(&next.salutation)
        .bind(next.enabled)
        .bind(next.locked_until)
        .bind(attempt_count(&next))
        .bind(next.updated_at)
        .bind(next.last_login_at)
        .bind(&next.password_hash)
        .bind(next.dob)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(next))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM principals")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
