//! Expired Entry Purge Task
//!
//! Background task that periodically removes expired entries from
//! backends without native TTL.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::error::CacheError;

/// Spawns a background task that calls [`Cache::purge_expired`] every
/// `interval`.
///
/// The task stops on its own once the cache is closed; otherwise abort it
/// through the returned handle.
///
/// # Example
/// ```ignore
/// let cache: Arc<dyn Cache> = Arc::from(open(BackendKind::Sled, options).await?);
/// let purge_handle = spawn_purge_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// purge_handle.abort();
/// ```
pub fn spawn_purge_task(cache: Arc<dyn Cache>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            backend = %cache.kind(),
            interval_ms = interval.as_millis() as u64,
            "starting expired entry purge task"
        );

        loop {
            tokio::time::sleep(interval).await;

            match cache.purge_expired().await {
                Ok(0) => debug!("purge: no expired entries found"),
                Ok(removed) => info!(removed, "purge: removed expired entries"),
                Err(CacheError::Closed) => {
                    info!("cache closed, stopping purge task");
                    break;
                }
                Err(err) => warn!(error = %err, "purge failed"),
            }
        }
    })
}
