//! Conversation claim model and request DTOs.

use agentdesk_core::types::{ChatId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `chat_lock_claims` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChatLockClaim {
    pub id: i64,
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub last_activity: Timestamp,
    pub created_at: Timestamp,
}

/// DTO for acquire, heartbeat, and release requests. The acting agent comes
/// from the request identity, never from the body.
#[derive(Debug, Deserialize)]
pub struct ClaimActionRequest {
    pub chat_id: ChatId,
}
