use crate::store::QueryCache;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Periodically deletes expired entries and runs eviction, matching the
/// reference cleanup loop. Errors are logged and swallowed — a cleanup
/// failure must never bring down the agent runtime.
pub fn spawn_cleanup_task(
    cache: Arc<QueryCache>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    let now = chrono::Utc::now().timestamp();
                    if let Err(e) = cache.delete_expired(now) {
                        tracing::error!(error = %e, "query cache cleanup: delete_expired failed");
                        continue;
                    }
                    if let Err(e) = cache.evict_if_needed() {
                        tracing::error!(error = %e, "query cache cleanup: evict_if_needed failed");
                    }
                }
            }
        }
    })
}
