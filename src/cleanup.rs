/// Periodic purge of expired refresh records.
///
/// Expiry is always enforced on use; this only keeps the store from
/// accumulating dead sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::auth::AuthService;

pub fn spawn_expired_token_cleanup(service: Arc<AuthService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match service.purge_expired().await {
                Ok(0) => tracing::debug!("No expired refresh tokens to purge"),
                Ok(purged) => tracing::info!(purged, "Purged expired refresh tokens"),
                Err(e) => tracing::warn!(error = %e, "Expired refresh token purge failed"),
            }
        }
    })
}
