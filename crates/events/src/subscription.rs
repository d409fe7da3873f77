//! Per-conversation view of the claim event stream.

use agentdesk_core::chat_lock::ClaimEvent;
use tokio::sync::broadcast;

use crate::bus::BusMessage;

/// A broadcast receiver narrowed to one `chat_id`.
///
/// A lagging receiver cannot tell which events it missed, and neither can
/// anyone after a [`BusMessage::Resync`]. Both are reported as a synthetic
/// release with an empty `user_id`: the consumer re-reads the store rather
/// than waiting forever on a release it will never see.
pub struct ChatSubscription {
    chat_id: String,
    receiver: broadcast::Receiver<BusMessage>,
}

impl ChatSubscription {
    pub fn new(chat_id: impl Into<String>, receiver: broadcast::Receiver<BusMessage>) -> Self {
        Self {
            chat_id: chat_id.into(),
            receiver,
        }
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Wait for the next event concerning this conversation.
    ///
    /// Returns `None` once the underlying bus is closed.
    pub async fn recv(&mut self) -> Option<ClaimEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(BusMessage::Claim(event)) if event.chat_id() == self.chat_id => {
                    return Some(event)
                }
                Ok(BusMessage::Claim(_)) => continue,
                Ok(BusMessage::Resync) => {
                    tracing::debug!(chat_id = %self.chat_id, "Claim feed resync, reporting possible release");
                    return Some(self.possible_release());
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        chat_id = %self.chat_id,
                        skipped,
                        "Claim subscription lagged, reporting possible release"
                    );
                    return Some(self.possible_release());
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    fn possible_release(&self) -> ClaimEvent {
        ClaimEvent::Released {
            chat_id: self.chat_id.clone(),
            user_id: String::new(),
        }
    }

    /// Wait for the next release of this conversation.
    pub async fn next_release(&mut self) -> Option<ClaimEvent> {
        loop {
            let event = self.recv().await?;
            if event.is_release() {
                return Some(event);
            }
        }
    }
}
