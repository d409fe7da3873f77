//! Forwards database claim notifications onto the in-process [`EventBus`].
//!
//! Every process that wants to react to claims changed by *other* processes
//! runs one relay. It holds a dedicated `LISTEN` connection and republishes
//! each decoded [`ClaimEvent`](agentdesk_core::chat_lock::ClaimEvent).
//!
//! `NOTIFY` is fire-and-forget: whatever is sent while the connection is
//! down never arrives. After every reconnect the relay publishes
//! [`BusMessage::Resync`](crate::BusMessage::Resync) so subscribers re-read
//! the store.

use std::sync::Arc;
use std::time::Duration;

use agentdesk_db::{ClaimListener, DbPool};
use tokio_util::sync::CancellationToken;

use crate::EventBus;

/// Delay before reopening the listening connection after a failure.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Background service bridging `NOTIFY` payloads to the event bus.
pub struct ClaimRelay {
    pool: DbPool,
    bus: Arc<EventBus>,
}

/// Why the inner receive loop ended.
enum Interrupted {
    Cancelled,
    ConnectionLost,
    Failed,
}

impl ClaimRelay {
    pub fn new(pool: DbPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    /// Spawn the relay loop on the current runtime.
    pub fn spawn(self, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }

    /// Run the relay loop until `cancel` is triggered.
    ///
    /// A dropped connection is reopened at once. Connect and receive errors
    /// are logged and retried after a fixed delay.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!("Claim relay started");
        let mut resync = false;

        loop {
            let mut listener = tokio::select! {
                _ = cancel.cancelled() => break,
                connected = ClaimListener::connect(&self.pool) => match connected {
                    Ok(listener) => listener,
                    Err(e) => {
                        tracing::error!(error = %e, "Claim relay failed to connect");
                        resync = true;
                        if self.wait_before_retry(&cancel).await {
                            continue;
                        }
                        break;
                    }
                },
            };

            if resync {
                tracing::info!("Claim relay reconnected, asking subscribers to resync");
                self.bus.publish_resync();
            }

            match self.forward(&mut listener, &cancel).await {
                Interrupted::Cancelled => break,
                Interrupted::ConnectionLost => {
                    resync = true;
                }
                Interrupted::Failed => {
                    resync = true;
                    if !self.wait_before_retry(&cancel).await {
                        break;
                    }
                }
            }
        }

        tracing::info!("Claim relay stopping");
    }

    /// Republish notifications from `listener` until it stops delivering.
    async fn forward(
        &self,
        listener: &mut ClaimListener,
        cancel: &CancellationToken,
    ) -> Interrupted {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Interrupted::Cancelled,
                received = listener.recv() => match received {
                    Ok(Some(event)) => {
                        tracing::debug!(
                            event_type = event.event_type(),
                            chat_id = %event.chat_id(),
                            user_id = %event.user_id(),
                            "Relaying claim change"
                        );
                        self.bus.publish(event);
                    }
                    Ok(None) => {
                        tracing::warn!("Claim listener connection lost, reconnecting");
                        return Interrupted::ConnectionLost;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Claim listener failed, reconnecting");
                        return Interrupted::Failed;
                    }
                },
            }
        }
    }

    /// Sleep for the reconnect delay. Returns `false` if cancelled meanwhile.
    async fn wait_before_retry(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(RECONNECT_DELAY) => true,
        }
    }
}
