//! Periodic liveness refresh of a held claim.
//!
//! A failed refresh is logged and retried on the next tick: the store may be
//! briefly unreachable and the claim still ours. A refresh that matches no
//! row is different. The claim was deleted under us (typically reclaimed by
//! the sweeper), so the heartbeat stops and reports the loss.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::store::ClaimStore;

/// Spawn a heartbeat for `(chat_id, user_id)` that runs until `cancel` is
/// triggered or the claim is found missing. The first refresh happens one
/// `period` after the call.
///
/// `on_lost` runs at most once, from the heartbeat task, when a refresh
/// matches no claim. It is never called after `cancel` fires.
pub fn spawn<S, F>(
    store: Arc<S>,
    chat_id: String,
    user_id: String,
    period: Duration,
    cancel: CancellationToken,
    on_lost: F,
) -> tokio::task::JoinHandle<()>
where
    S: ClaimStore + ?Sized,
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!(%chat_id, %user_id, period_ms = period.as_millis() as u64, "Claim heartbeat started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match store.touch_claim(&chat_id, &user_id).await {
                        Ok(true) => {
                            tracing::trace!(%chat_id, %user_id, "Claim heartbeat");
                        }
                        Ok(false) => {
                            if !cancel.is_cancelled() {
                                tracing::warn!(%chat_id, %user_id, "Claim no longer held, heartbeat stopping");
                                on_lost();
                            }
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(%chat_id, %user_id, error = %e, "Claim heartbeat failed");
                        }
                    }
                }
            }
        }

        tracing::debug!(%chat_id, %user_id, "Claim heartbeat stopped");
    })
}
