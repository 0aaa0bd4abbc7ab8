//! Background purge of dead token records.
//!
//! Records are never deleted inline: revocation and expiry only mark them
//! dead, and this job removes rows that are both revoked and past natural
//! expiry. Rows that are expired but never revoked are kept, and rows that
//! are revoked but still inside their lifetime are kept so the revoked
//! verdict stays observable until the token would have died anyway.

use std::time::Duration;

use chrono::Utc;
use tracing::{error, info};

use warden_core::AuthResult;

use crate::store::TokenStore;

/// One purge sweep at time `now` (epoch seconds).
pub async fn purge_revoked<S: TokenStore>(store: &S, now: i64) -> AuthResult<u64> {
    let removed = store.purge_expired(now).await?;
    if removed > 0 {
        info!(removed, "purged dead token records");
    }
    Ok(removed)
}

/// Periodic purge driver.
pub struct PurgeRunner<S> {
    store: S,
    interval: Duration,
}

impl<S> PurgeRunner<S>
where
    S: TokenStore,
{
    pub fn new(store: S, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run forever, sweeping once per interval. A failed sweep is logged and
    /// retried on the next tick; the loop itself never dies.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = purge_revoked(&self.store, Utc::now().timestamp()).await {
                error!(error = %e, "token purge sweep failed");
            }
        }
    }
}
