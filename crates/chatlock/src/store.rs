//! The boundary between claim logic and the shared backing store.

use agentdesk_core::types::UserId;
use agentdesk_events::ChatSubscription;
use async_trait::async_trait;

use crate::error::{InsertError, StoreError};

/// Shared row store holding at most one claim per conversation.
///
/// Implementations must enforce uniqueness on `chat_id` at insert time and
/// must filter `touch_claim` / `delete_claim` on the full
/// `(chat_id, user_id)` pair.
#[async_trait]
pub trait ClaimStore: Send + Sync + 'static {
    /// Return the holder of `chat_id`, or `None` if unclaimed.
    ///
    /// `Ok(None)` means "no claim"; a failed read is always `Err`.
    async fn read_claim(&self, chat_id: &str) -> Result<Option<UserId>, StoreError>;

    /// Create the claim row for `(chat_id, user_id)`.
    async fn insert_claim(&self, chat_id: &str, user_id: &str) -> Result<(), InsertError>;

    /// Refresh `last_activity` on the claim. Returns `false` if no row
    /// matches `(chat_id, user_id)`.
    async fn touch_claim(&self, chat_id: &str, user_id: &str) -> Result<bool, StoreError>;

    /// Delete the claim. Returns `false` (not an error) if no row matches.
    async fn delete_claim(&self, chat_id: &str, user_id: &str) -> Result<bool, StoreError>;

    /// Subscribe to changes of one conversation's claim.
    fn subscribe(&self, chat_id: &str) -> ChatSubscription;
}
