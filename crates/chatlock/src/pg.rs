//! Postgres-backed claim store.

use std::sync::Arc;

use agentdesk_core::chat_lock::CLAIM_UNIQUE_CONSTRAINT;
use agentdesk_core::types::UserId;
use agentdesk_db::repositories::ChatLockRepo;
use agentdesk_db::{is_unique_violation, DbPool};
use agentdesk_events::{ChatSubscription, ClaimRelay, EventBus};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{InsertError, StoreError};
use crate::store::ClaimStore;

/// A [`ClaimStore`] over the `chat_lock_claims` table.
///
/// Change notifications come from the shared [`EventBus`], which a
/// [`ClaimRelay`] feeds from the table's `NOTIFY` trigger.
#[derive(Clone)]
pub struct PgClaimStore {
    pool: DbPool,
    bus: Arc<EventBus>,
}

impl PgClaimStore {
    /// Wrap a pool and a bus that some [`ClaimRelay`] already feeds.
    pub fn new(pool: DbPool, bus: Arc<EventBus>) -> Self {
        Self { pool, bus }
    }

    /// Create a store with its own bus and spawn the relay feeding it.
    ///
    /// The relay runs until `cancel` is triggered.
    pub fn with_relay(pool: DbPool, cancel: CancellationToken) -> Self {
        let bus = Arc::new(EventBus::default());
        ClaimRelay::new(pool.clone(), Arc::clone(&bus)).spawn(cancel);
        Self { pool, bus }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}

#[async_trait]
impl ClaimStore for PgClaimStore {
    async fn read_claim(&self, chat_id: &str) -> Result<Option<UserId>, StoreError> {
        let claim = ChatLockRepo::find_by_chat(&self.pool, chat_id).await?;
        Ok(claim.map(|c| c.user_id))
    }

    async fn insert_claim(&self, chat_id: &str, user_id: &str) -> Result<(), InsertError> {
        match ChatLockRepo::insert(&self.pool, chat_id, user_id).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(InsertError::AlreadyClaimed {
                chat_id: chat_id.to_string(),
            }),
            Err(e) if is_unique_violation(&e, Some(CLAIM_UNIQUE_CONSTRAINT)) => {
                Err(InsertError::AlreadyClaimed {
                    chat_id: chat_id.to_string(),
                })
            }
            Err(e) => Err(StoreError::Database(e).into()),
        }
    }

    async fn touch_claim(&self, chat_id: &str, user_id: &str) -> Result<bool, StoreError> {
        Ok(ChatLockRepo::touch(&self.pool, chat_id, user_id).await?)
    }

    async fn delete_claim(&self, chat_id: &str, user_id: &str) -> Result<bool, StoreError> {
        Ok(ChatLockRepo::delete(&self.pool, chat_id, user_id).await?)
    }

    fn subscribe(&self, chat_id: &str) -> ChatSubscription {
        self.bus.subscribe_chat(chat_id)
    }
}
