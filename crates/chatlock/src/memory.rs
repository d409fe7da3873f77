//! In-process claim store.
//!
//! Enforces the same uniqueness and holder-filtering rules as the database
//! and publishes the same change events, so sessions behave identically
//! against it. Used by tests and by single-process tooling.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use agentdesk_core::chat_lock::ClaimEvent;
use agentdesk_core::types::{ChatId, Timestamp, UserId};
use agentdesk_events::{ChatSubscription, EventBus};
use async_trait::async_trait;
use chrono::Utc;

use crate::error::{InsertError, StoreError};
use crate::store::ClaimStore;

#[derive(Debug, Clone)]
struct MemoryClaim {
    user_id: UserId,
    last_activity: Timestamp,
}

/// A [`ClaimStore`] backed by a `HashMap` keyed on `chat_id`.
#[derive(Default)]
pub struct MemoryClaimStore {
    claims: Mutex<HashMap<ChatId, MemoryClaim>>,
    bus: EventBus,
}

impl MemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn claims(&self) -> MutexGuard<'_, HashMap<ChatId, MemoryClaim>> {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current holder of `chat_id`, if any.
    pub fn holder(&self, chat_id: &str) -> Option<UserId> {
        self.claims().get(chat_id).map(|c| c.user_id.clone())
    }

    /// When the claim on `chat_id` was last refreshed.
    pub fn last_activity(&self, chat_id: &str) -> Option<Timestamp> {
        self.claims().get(chat_id).map(|c| c.last_activity)
    }

    /// Number of claimed conversations.
    pub fn len(&self) -> usize {
        self.claims().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete every claim last refreshed before `cutoff`, publishing a
    /// release for each. Returns the reclaimed `(chat_id, user_id)` pairs.
    pub fn reclaim_stale(&self, cutoff: Timestamp) -> Vec<(ChatId, UserId)> {
        let reclaimed: Vec<_> = {
            let mut claims = self.claims();
            let stale: Vec<ChatId> = claims
                .iter()
                .filter(|(_, c)| c.last_activity < cutoff)
                .map(|(chat_id, _)| chat_id.clone())
                .collect();
            stale
                .into_iter()
                .filter_map(|chat_id| claims.remove(&chat_id).map(|c| (chat_id, c.user_id)))
                .collect()
        };
        for (chat_id, user_id) in &reclaimed {
            self.bus.publish(ClaimEvent::Released {
                chat_id: chat_id.clone(),
                user_id: user_id.clone(),
            });
        }
        reclaimed
    }
}

#[async_trait]
impl ClaimStore for MemoryClaimStore {
    async fn read_claim(&self, chat_id: &str) -> Result<Option<UserId>, StoreError> {
        Ok(self.holder(chat_id))
    }

    async fn insert_claim(&self, chat_id: &str, user_id: &str) -> Result<(), InsertError> {
        {
            let mut claims = self.claims();
            match claims.entry(chat_id.to_string()) {
                Entry::Occupied(_) => {
                    return Err(InsertError::AlreadyClaimed {
                        chat_id: chat_id.to_string(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(MemoryClaim {
                        user_id: user_id.to_string(),
                        last_activity: Utc::now(),
                    });
                }
            }
        }
        self.bus.publish(ClaimEvent::Acquired {
            chat_id: chat_id.to_string(),
            user_id: user_id.to_string(),
        });
        Ok(())
    }

    async fn touch_claim(&self, chat_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut claims = self.claims();
        match claims.get_mut(chat_id) {
            Some(claim) if claim.user_id == user_id => {
                claim.last_activity = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_claim(&self, chat_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let removed = {
            let mut claims = self.claims();
            match claims.get(chat_id) {
                Some(claim) if claim.user_id == user_id => claims.remove(chat_id).is_some(),
                _ => false,
            }
        };
        if removed {
            self.bus.publish(ClaimEvent::Released {
                chat_id: chat_id.to_string(),
                user_id: user_id.to_string(),
            });
        }
        Ok(removed)
    }

    fn subscribe(&self, chat_id: &str) -> ChatSubscription {
        self.bus.subscribe_chat(chat_id)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn insert_rejects_second_claim() {
        let store = MemoryClaimStore::new();
        store.insert_claim("c1", "agent-a").await.unwrap();

        let err = store.insert_claim("c1", "agent-b").await.unwrap_err();
        assert_matches!(err, InsertError::AlreadyClaimed { chat_id } if chat_id == "c1");
        assert_eq!(store.holder("c1").as_deref(), Some("agent-a"));
    }

    #[tokio::test]
    async fn touch_and_delete_are_holder_only() {
        let store = MemoryClaimStore::new();
        store.insert_claim("c1", "agent-a").await.unwrap();

        assert!(!store.touch_claim("c1", "agent-b").await.unwrap());
        assert!(!store.delete_claim("c1", "agent-b").await.unwrap());
        assert!(store.touch_claim("c1", "agent-a").await.unwrap());
        assert!(store.delete_claim("c1", "agent-a").await.unwrap());
        assert!(!store.delete_claim("c1", "agent-a").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn changes_are_published_to_chat_subscribers() {
        let store = MemoryClaimStore::new();
        let mut sub = store.subscribe("c1");

        store.insert_claim("c1", "agent-a").await.unwrap();
        store.delete_claim("c1", "agent-b").await.unwrap();
        store.delete_claim("c1", "agent-a").await.unwrap();

        assert_eq!(
            sub.recv().await,
            Some(ClaimEvent::Acquired {
                chat_id: "c1".into(),
                user_id: "agent-a".into()
            })
        );
        // The failed delete by agent-b published nothing.
        assert_eq!(
            sub.recv().await,
            Some(ClaimEvent::Released {
                chat_id: "c1".into(),
                user_id: "agent-a".into()
            })
        );
    }

    #[tokio::test]
    async fn reclaim_stale_removes_only_old_claims() {
        let store = MemoryClaimStore::new();
        store.insert_claim("old", "agent-a").await.unwrap();
        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        let reclaimed = store.reclaim_stale(cutoff);
        assert_eq!(reclaimed, vec![("old".to_string(), "agent-a".to_string())]);

        store.insert_claim("fresh", "agent-b").await.unwrap();
        let reclaimed = store.reclaim_stale(Utc::now() - chrono::Duration::minutes(5));
        assert!(reclaimed.is_empty());
        assert_eq!(store.len(), 1);
    }
}
