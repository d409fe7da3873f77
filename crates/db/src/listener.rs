//! `LISTEN`/`NOTIFY` subscription to claim row changes.
//!
//! The `trg_chat_lock_claims_notify` trigger publishes one JSON payload per
//! inserted or deleted claim on [`NOTIFY_CHANNEL`]. [`ClaimListener`] decodes
//! those payloads into [`ClaimEvent`]s.

use agentdesk_core::chat_lock::{ClaimEvent, NOTIFY_CHANNEL};
use sqlx::postgres::PgListener;

use crate::DbPool;

/// A dedicated listening connection on the claim notification channel.
pub struct ClaimListener {
    inner: PgListener,
}

impl ClaimListener {
    /// Open a listening connection from the pool's connect options.
    pub async fn connect(pool: &DbPool) -> Result<Self, sqlx::Error> {
        let mut inner = PgListener::connect_with(pool).await?;
        inner.listen(NOTIFY_CHANNEL).await?;
        tracing::debug!(channel = NOTIFY_CHANNEL, "Listening for claim changes");
        Ok(Self { inner })
    }

    /// Wait for the next claim change.
    ///
    /// Returns `Ok(None)` when the listening connection was lost. Any
    /// notification sent from then on is gone, so the caller should drop
    /// this listener, connect a new one, and treat every claim as possibly
    /// changed. Malformed payloads are logged and skipped.
    pub async fn recv(&mut self) -> Result<Option<ClaimEvent>, sqlx::Error> {
        loop {
            let Some(notification) = self.inner.try_recv().await? else {
                return Ok(None);
            };
            match decode_payload(notification.payload()) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        payload = notification.payload(),
                        "Ignoring malformed claim notification"
                    );
                }
            }
        }
    }
}

/// Decode a trigger payload into a [`ClaimEvent`].
pub fn decode_payload(payload: &str) -> Result<ClaimEvent, serde_json::Error> {
    serde_json::from_str(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_delete_payload() {
        let event =
            decode_payload(r#"{"type" : "claim.released", "chat_id" : "c1", "user_id" : "u1"}"#)
                .unwrap();
        assert_eq!(
            event,
            ClaimEvent::Released {
                chat_id: "c1".into(),
                user_id: "u1".into()
            }
        );
    }

    #[test]
    fn rejects_unknown_event_type() {
        assert!(decode_payload(r#"{"type":"claim.updated","chat_id":"c1","user_id":"u1"}"#).is_err());
    }

    #[test]
    fn rejects_payload_missing_user() {
        assert!(decode_payload(r#"{"type":"claim.acquired","chat_id":"c1"}"#).is_err());
    }
}
