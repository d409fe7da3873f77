//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`ClaimEvent`]s. It is
//! shared via `Arc<EventBus>` between the claim store, the relay, and the
//! HTTP change feed. Besides claim changes it carries [`BusMessage::Resync`]
//! when an upstream gap means changes may have been missed.

use agentdesk_core::chat_lock::ClaimEvent;
use tokio::sync::broadcast;

use crate::subscription::ChatSubscription;

/// What travels over the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    /// A claim row changed.
    Claim(ClaimEvent),
    /// Changes may have been lost upstream (the notification connection
    /// dropped). Subscribers must re-read any claim they care about.
    Resync,
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// # Usage
///
/// ```rust
/// use agentdesk_core::chat_lock::ClaimEvent;
/// use agentdesk_events::EventBus;
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(ClaimEvent::Released {
///     chat_id: "c1".into(),
///     user_id: "agent-a".into(),
/// });
/// ```
pub struct EventBus {
    sender: broadcast::Sender<BusMessage>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: ClaimEvent) {
        // Ignore the SendError; it only means there are zero receivers.
        let _ = self.sender.send(BusMessage::Claim(event));
    }

    /// Tell every subscriber that changes may have been missed.
    pub fn publish_resync(&self) {
        let _ = self.sender.send(BusMessage::Resync);
    }

    /// Subscribe to every claim change.
    pub fn subscribe(&self) -> broadcast::Receiver<BusMessage> {
        self.sender.subscribe()
    }

    /// Subscribe to changes of a single conversation.
    pub fn subscribe_chat(&self, chat_id: impl Into<String>) -> ChatSubscription {
        ChatSubscription::new(chat_id, self.subscribe())
    }

    /// Number of live receivers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn released(chat_id: &str) -> ClaimEvent {
        ClaimEvent::Released {
            chat_id: chat_id.into(),
            user_id: "agent-a".into(),
        }
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(released("c1"));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received, BusMessage::Claim(released("c1")));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(released("c1"));

        assert_eq!(rx1.recv().await.unwrap(), BusMessage::Claim(released("c1")));
        assert_eq!(rx2.recv().await.unwrap(), BusMessage::Claim(released("c1")));
    }

    #[tokio::test]
    async fn resync_reaches_every_subscriber() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish_resync();

        assert_eq!(rx1.recv().await.unwrap(), BusMessage::Resync);
        assert_eq!(rx2.recv().await.unwrap(), BusMessage::Resync);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(released("orphan"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        let sub = bus.subscribe_chat("c1");
        assert_eq!(bus.subscriber_count(), 2);
        drop(rx);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
