/// Refresh Coordinator
///
/// Session lifecycle for one identity:
///
/// ```text
/// NoSession --login--> Active(t1) --refresh(t1)--> Active(t2) --> ...
///                          |                           |
///                       logout                     expiry
///                          v                           v
///                       Revoked                     Expired
/// ```
///
/// A refresh token is single-use: once `t_n` has been exchanged, presenting
/// it again fails and the client must log in again.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::issuer::{TokenIssuer, TokenPair};
use crate::auth::refresh_token::token_matches;
use crate::clock::Clock;
use crate::error::{AppError, AuthError, StoreError};
use crate::store::{with_timeout, IdentityRepository, TokenStore};

pub struct RefreshCoordinator {
    identities: Arc<dyn IdentityRepository>,
    store: Arc<dyn TokenStore>,
    issuer: Arc<TokenIssuer>,
    clock: Arc<dyn Clock>,
    lookup_timeout: Duration,
}

impl RefreshCoordinator {
    pub fn new(
        identities: Arc<dyn IdentityRepository>,
        store: Arc<dyn TokenStore>,
        issuer: Arc<TokenIssuer>,
        clock: Arc<dyn Clock>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            identities,
            store,
            issuer,
            clock,
            lookup_timeout,
        }
    }

    /// Exchange `presented` for a brand-new token pair.
    ///
    /// # Errors
    /// - `AuthError::Unauthorized`: no session, wrong token, or the token
    ///   was already rotated (including by a concurrent refresh)
    /// - `AuthError::TokenExpired`: the token matches but is past its expiry
    pub async fn refresh(&self, email: &str, presented: &str) -> Result<TokenPair, AppError> {
        let record = match with_timeout(self.lookup_timeout, self.store.find_by_identity(email)).await {
            Ok(record) => record,
            Err(StoreError::NotFound(_)) => {
                tracing::warn!(email = %email, "Refresh attempted without an active session");
                return Err(AuthError::Unauthorized.into());
            }
            Err(e) => return Err(e.into()),
        };

        if !token_matches(presented, &record.token_hash) {
            tracing::warn!(email = %email, "Refresh token mismatch, possible replay");
            return Err(AuthError::Unauthorized.into());
        }

        if record.is_expired(self.clock.now()) {
            tracing::info!(email = %email, expired_at = %record.expires_at, "Refresh token expired");
            return Err(AuthError::TokenExpired.into());
        }

        let identity = with_timeout(self.lookup_timeout, self.identities.find_by_email(email))
            .await?
            .ok_or(AuthError::Unauthorized)?;

        let pair = self.issuer.issue(&identity)?;

        let rotated = with_timeout(
            self.lookup_timeout,
            self.store.rotate(
                email,
                presented,
                &pair.refresh_token,
                pair.creation,
                pair.refresh_expiration,
            ),
        )
        .await;

        match rotated {
            Ok(()) => {
                tracing::info!(user_id = %identity.id, "Refresh token rotated");
                Ok(pair)
            }
            Err(StoreError::NotFound(_)) => {
                tracing::warn!(email = %email, "Refresh token rotated concurrently");
                Err(AuthError::Unauthorized.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
