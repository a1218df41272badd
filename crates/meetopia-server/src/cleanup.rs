use std::time::Duration;

use tracing::{debug, info, warn};

use meetopia_api::auth::AppState;
use meetopia_db::format_timestamp;

/// Background task that deletes expired sessions and drops stale match
/// queue entries.
pub async fn run_cleanup_loop(state: AppState, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let db = state.clone();
        let now = chrono::Utc::now();
        let cutoff = format_timestamp(now);
        match tokio::task::spawn_blocking(move || db.db.delete_expired_sessions(&cutoff)).await {
            Ok(Ok(count)) if count > 0 => info!("Cleanup: removed {} expired sessions", count),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Cleanup error: {}", e),
            Err(e) => warn!("Cleanup task failed: {}", e),
        }

        let pruned = state.matchmaker.prune(now);
        if pruned > 0 {
            debug!("Cleanup: dropped {} stale match entries", pruned);
        }
    }
}
