/// PostgreSQL store backends (`storage.backend = "postgres"`).
///
/// Schema lives in `migrations/`. Rotation is a single conditional UPDATE,
/// so the row lock serializes concurrent refreshes across processes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{IdentityRepository, RefreshRecord, StoreResult, TokenStore};
use crate::auth::hash_token;
use crate::error::StoreError;
use crate::identity::{Identity, NewIdentity, Role};

type IdentityRow = (Uuid, String, String, Vec<String>, DateTime<Utc>);
type RefreshRow = (String, String, DateTime<Utc>, DateTime<Utc>);

fn identity_from_row(row: IdentityRow) -> StoreResult<Identity> {
    let (id, email, password_hash, roles, created_at) = row;
    let roles = roles
        .iter()
        .map(|role| role.parse::<Role>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::Backend)?;

    Ok(Identity {
        id,
        email,
        password_hash,
        roles,
        created_at,
    })
}

fn record_from_row(row: RefreshRow) -> RefreshRecord {
    let (email, token_hash, created_at, expires_at) = row;
    RefreshRecord {
        email,
        token_hash,
        created_at,
        expires_at,
    }
}

#[derive(Clone)]
pub struct PgIdentityRepository {
    pool: PgPool,
}

impl PgIdentityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityRepository for PgIdentityRepository {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, email, password_hash, roles, created_at
            FROM identities
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(identity_from_row).transpose()
    }

    async fn create(&self, identity: NewIdentity) -> StoreResult<Identity> {
        let identity = identity.into_identity(Utc::now());
        let roles: Vec<String> = identity.roles.iter().map(|r| r.to_string()).collect();

        sqlx::query(
            r#"
            INSERT INTO identities (id, email, password_hash, roles, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(identity.id)
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(roles)
        .bind(identity.created_at)
        .execute(&self.pool)
        .await?;

        Ok(identity)
    }
}

#[derive(Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn save(
        &self,
        email: &str,
        refresh_token: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (email, token_hash, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET token_hash = EXCLUDED.token_hash,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(email)
        .bind(hash_token(refresh_token))
        .bind(created_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, refresh_token: &str) -> StoreResult<RefreshRecord> {
        sqlx::query_as::<_, RefreshRow>(
            r#"
            SELECT email, token_hash, created_at, expires_at
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(hash_token(refresh_token))
        .fetch_optional(&self.pool)
        .await?
        .map(record_from_row)
        .ok_or_else(|| StoreError::NotFound("refresh token".to_string()))
    }

    async fn find_by_identity(&self, email: &str) -> StoreResult<RefreshRecord> {
        sqlx::query_as::<_, RefreshRow>(
            r#"
            SELECT email, token_hash, created_at, expires_at
            FROM refresh_tokens
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(record_from_row)
        .ok_or_else(|| StoreError::NotFound("refresh token".to_string()))
    }

    async fn rotate(
        &self,
        email: &str,
        presented_token: &str,
        new_token: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET token_hash = $3, created_at = $4, expires_at = $5
            WHERE email = $1 AND token_hash = $2
            "#,
        )
        .bind(email)
        .bind(hash_token(presented_token))
        .bind(hash_token(new_token))
        .bind(created_at)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("refresh token".to_string()));
        }
        Ok(())
    }

    async fn invalidate(&self, email: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
