//! Periodic cleanup of expired refresh and extension tokens.
//!
//! Expired rows can never validate again, so deleting them only bounds table
//! growth. Runs on a fixed interval using `tokio::time::interval`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use scout_store::TokenStore;
use tokio_util::sync::CancellationToken;

/// How often the cleanup job runs.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600); // 1 hour

/// Run the token retention cleanup loop until `cancel` is triggered.
pub async fn run(store: Arc<dyn TokenStore>, cancel: CancellationToken) {
    tracing::info!(
        interval_secs = CLEANUP_INTERVAL.as_secs(),
        "Token retention job started"
    );

    let mut interval = tokio::time::interval(CLEANUP_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Token retention job stopping");
                break;
            }
            _ = interval.tick() => {
                match store.purge_expired(Utc::now()).await {
                    Ok(deleted) => {
                        if deleted > 0 {
                            tracing::info!(deleted, "Token retention: purged expired tokens");
                        } else {
                            tracing::debug!("Token retention: nothing to purge");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Token retention: cleanup failed");
                    }
                }
            }
        }
    }
}
