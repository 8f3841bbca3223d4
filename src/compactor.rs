use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;

pub const CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Compact the WAL when it has grown past `threshold` appends.
/// Returns whether a compaction ran.
pub async fn compact_if_needed(engine: &Engine, threshold: u64) -> bool {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match engine.compact_wal().await {
        Ok(()) => {
            metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
            info!("compacted WAL after {appends} appends");
            true
        }
        Err(e) => {
            tracing::error!("WAL compaction failed: {e}");
            false
        }
    }
}

/// Background task: check the WAL size every `interval`.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        compact_if_needed(&engine, threshold).await;
        metrics::gauge!(crate::observability::ROOMS).set(engine.room_count() as f64);
    }
}
