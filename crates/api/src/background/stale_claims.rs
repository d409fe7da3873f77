//! Periodic reclamation of abandoned claims.
//!
//! A claim whose holder crashed or lost connectivity stops receiving
//! heartbeats. This job deletes claims whose `last_activity` is older than
//! the stale threshold. Each deletion fires the table's notify trigger, so
//! sessions waiting on the conversation re-acquire through the normal path.

use std::time::Duration;

use agentdesk_db::repositories::ChatLockRepo;
use agentdesk_db::DbPool;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

/// Delete every claim older than `stale_secs` once.
///
/// Returns the number of reclaimed claims.
pub async fn sweep_once(pool: &DbPool, stale_secs: i64) -> Result<usize, sqlx::Error> {
    let cutoff = Utc::now() - chrono::Duration::seconds(stale_secs);
    let reclaimed = ChatLockRepo::delete_stale(pool, cutoff).await?;
    for claim in &reclaimed {
        tracing::info!(
            chat_id = %claim.chat_id,
            user_id = %claim.user_id,
            last_activity = %claim.last_activity,
            "Reclaimed stale claim"
        );
    }
    Ok(reclaimed.len())
}

/// Run the stale-claim sweeper loop.
///
/// Runs until `cancel` is triggered. Failures are logged and retried on the
/// next tick.
pub async fn run(pool: DbPool, stale_secs: i64, every: Duration, cancel: CancellationToken) {
    tracing::info!(
        stale_secs,
        interval_secs = every.as_secs(),
        "Stale claim sweeper started"
    );

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Stale claim sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                match sweep_once(&pool, stale_secs).await {
                    Ok(0) => tracing::debug!("Stale claim sweep: nothing to reclaim"),
                    Ok(reclaimed) => tracing::info!(reclaimed, "Stale claim sweep finished"),
                    Err(e) => tracing::error!(error = %e, "Stale claim sweep failed"),
                }
            }
        }
    }
}
