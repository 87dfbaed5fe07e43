/// In-process store backends, used when `storage.backend = "memory"` and
/// by the test suites.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{IdentityRepository, RefreshRecord, StoreResult, TokenStore};
use crate::auth::hash_token;
use crate::error::StoreError;
use crate::identity::{Identity, NewIdentity};

#[derive(Default)]
pub struct InMemoryIdentityRepository {
    identities: RwLock<HashMap<String, Identity>>,
}

impl InMemoryIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityRepository for InMemoryIdentityRepository {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Identity>> {
        Ok(self.identities.read().await.get(email).cloned())
    }

    async fn create(&self, identity: NewIdentity) -> StoreResult<Identity> {
        let mut identities = self.identities.write().await;
        if identities.contains_key(&identity.email) {
            return Err(StoreError::Conflict("Email already registered".to_string()));
        }

        let identity = identity.into_identity(Utc::now());
        identities.insert(identity.email.clone(), identity.clone());
        Ok(identity)
    }
}

#[derive(Default)]
struct TokenTables {
    by_identity: HashMap<String, RefreshRecord>,
    /// token digest -> email
    by_hash: HashMap<String, String>,
}

impl TokenTables {
    fn put(&mut self, record: RefreshRecord) {
        if let Some(previous) = self.by_identity.remove(&record.email) {
            self.by_hash.remove(&previous.token_hash);
        }
        self.by_hash.insert(record.token_hash.clone(), record.email.clone());
        self.by_identity.insert(record.email.clone(), record);
    }

    fn remove(&mut self, email: &str) -> Option<RefreshRecord> {
        let record = self.by_identity.remove(email)?;
        self.by_hash.remove(&record.token_hash);
        Some(record)
    }
}

/// All mutations happen under one write lock, which is what makes
/// `rotate` a compare-and-swap.
#[derive(Default)]
pub struct InMemoryTokenStore {
    tables: RwLock<TokenTables>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.tables.read().await.by_identity.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn save(
        &self,
        email: &str,
        refresh_token: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let record = RefreshRecord {
            email: email.to_string(),
            token_hash: hash_token(refresh_token),
            created_at,
            expires_at,
        };
        self.tables.write().await.put(record);
        Ok(())
    }

    async fn find(&self, refresh_token: &str) -> StoreResult<RefreshRecord> {
        let token_hash = hash_token(refresh_token);
        let tables = self.tables.read().await;

        tables
            .by_hash
            .get(&token_hash)
            .and_then(|email| tables.by_identity.get(email))
            .cloned()
            .ok_or_else(|| StoreError::NotFound("refresh token".to_string()))
    }

    async fn find_by_identity(&self, email: &str) -> StoreResult<RefreshRecord> {
        self.tables
            .read()
            .await
            .by_identity
            .get(email)
            .cloned()
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
        let presented_hash = hash_token(presented_token);
        let mut tables = self.tables.write().await;

        match tables.by_identity.get(email) {
            Some(current) if current.token_hash == presented_hash => {}
            _ => return Err(StoreError::NotFound("refresh token".to_string())),
        }

        tables.put(RefreshRecord {
            email: email.to_string(),
            token_hash: hash_token(new_token),
            created_at,
            expires_at,
        });
        Ok(())
    }

    async fn invalidate(&self, email: &str) -> StoreResult<()> {
        self.tables.write().await.remove(email);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let expired: Vec<String> = tables
            .by_identity
            .values()
            .filter(|record| record.is_expired(now))
            .map(|record| record.email.clone())
            .collect();

        for email in &expired {
            tables.remove(email);
        }
        Ok(expired.len() as u64)
    }
}
