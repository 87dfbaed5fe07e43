/// Persistence seams
///
/// Identities and refresh-token state are reached only through these two
/// traits. Every load and save is an explicit call; nothing is cached or
/// loaded behind the caller's back.

mod memory;
mod postgres;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::identity::{Identity, NewIdentity};

pub use memory::{InMemoryIdentityRepository, InMemoryTokenStore};
pub use postgres::{PgIdentityRepository, PgTokenStore};

pub type StoreResult<T> = Result<T, StoreError>;

/// Bound a store call by `limit`
pub async fn with_timeout<T>(
    limit: Duration,
    future: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit.as_millis())),
    }
}

/// The single live refresh token of one identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRecord {
    pub email: String,
    /// SHA-256 hex digest of the refresh token
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>>;

    /// Fails with `StoreError::Conflict` when the email is taken
    async fn create(&self, identity: NewIdentity) -> StoreResult<Identity>;
}

/// Refresh-token state, at most one record per identity.
///
/// Implementations take plaintext tokens and persist only their digest
/// (see `auth::hash_token`).
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert or overwrite the identity's record
    async fn save(
        &self,
        email: &str,
        refresh_token: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// `NotFound` when the token was never issued or is no longer current
    async fn find(&self, refresh_token: &str) -> StoreResult<RefreshRecord>;

    async fn find_by_identity(&self, email: &str) -> StoreResult<RefreshRecord>;

    /// Replace the record only if it still holds `presented_token`.
    /// `NotFound` when another writer got there first.
    async fn rotate(
        &self,
        email: &str,
        presented_token: &str,
        new_token: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Remove the identity's record; a no-op when there is none
    async fn invalidate(&self, email: &str) -> StoreResult<()>;

    /// Drop every record expired at `now`, returning how many went
    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}
