//! Cache Sweep Task
//!
//! Background task that periodically drops expired detection results so
//! stale entries do not sit in memory between requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::DetectionCache;

/// Spawns a background task that purges expired cache entries.
///
/// The task sleeps for `cleanup_interval_secs` (at least one second) between
/// sweeps and takes the write lock only for the purge itself.
///
/// # Returns
/// A JoinHandle for the spawned task, aborted during graceful shutdown.
pub fn spawn_cleanup_task<V>(
    cache: Arc<RwLock<DetectionCache<V>>>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting cache sweep task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.write().await.purge_expired();

            if removed > 0 {
                info!("Cache sweep: removed {} expired detection results", removed);
            } else {
                debug!("Cache sweep: nothing expired");
            }
        }
    })
}
