use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::interval;
use tracing::{debug, error, info, instrument};

use crate::shared::AppError;

/// Denylist of tokens that were logged out before their natural expiry.
///
/// Entries only need to live until the token's own `exp`; after that the
/// token service rejects the token anyway, so implementations may drop them.
#[async_trait]
pub trait RevocationList {
    async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), AppError>;
    async fn is_revoked(&self, token: &str) -> Result<bool, AppError>;
    async fn purge_expired(&self) -> Result<u64, AppError>;
}

/// Process-local revocation list
pub struct InMemoryRevocationList {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Default for InMemoryRevocationList {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRevocationList {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of tracked entries, expired or not
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl RevocationList for InMemoryRevocationList {
    #[instrument(skip(self, token))]
    async fn revoke(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), AppError> {
        self.entries
            .lock()
            .await
            .insert(token.to_string(), expires_at);

        debug!(expires_at = %expires_at, "Token added to revocation list");
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn is_revoked(&self, token: &str) -> Result<bool, AppError> {
        let revoked = self
            .entries
            .lock()
            .await
            .get(token)
            .is_some_and(|expires_at| *expires_at > Utc::now());

        Ok(revoked)
    }

    #[instrument(skip(self))]
    async fn purge_expired(&self) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut entries = self.entries.lock().await;
        let initial_count = entries.len();

        entries.retain(|_, expires_at| *expires_at > now);

        let removed_count = initial_count - entries.len();
        debug!(
            removed_entries = removed_count,
            "Expired revocation entries purged"
        );
        Ok(removed_count as u64)
    }
}

/// Periodically drops revocation entries whose tokens have expired
#[instrument(skip(revocation_list))]
pub async fn start_purge_task(
    revocation_list: Arc<dyn RevocationList + Send + Sync>,
    purge_interval: Duration,
) {
    info!(
        purge_interval_secs = purge_interval.as_secs(),
        "Starting revocation purge background task"
    );

    let mut ticker = interval(purge_interval);

    loop {
        ticker.tick().await;

        match revocation_list.purge_expired().await {
            Ok(removed) if removed > 0 => {
                info!(removed_entries = removed, "Revocation purge completed");
            }
            Ok(_) => debug!("No expired revocation entries"),
            Err(e) => error!(error = %e, "Revocation purge failed"),
        }
    }
}
