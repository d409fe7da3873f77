//! Repository for the `chat_lock_claims` table.

use agentdesk_core::chat_lock::CLAIM_UNIQUE_CONSTRAINT;
use agentdesk_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::chat_lock::ChatLockClaim;

/// Column list for `chat_lock_claims` queries.
const COLUMNS: &str = "id, chat_id, user_id, last_activity, created_at";

/// Provides the claim operations the session lock and HTTP service rely on.
///
/// Mutations are always filtered on `(chat_id, user_id)` so a session can
/// only touch or delete the claim it inserted.
pub struct ChatLockRepo;

impl ChatLockRepo {
    /// Get the claim for a conversation, or `None` if nobody holds it.
    pub async fn find_by_chat(
        pool: &PgPool,
        chat_id: &str,
    ) -> Result<Option<ChatLockClaim>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM chat_lock_claims WHERE chat_id = $1");
        sqlx::query_as::<_, ChatLockClaim>(&query)
            .bind(chat_id)
            .fetch_optional(pool)
            .await
    }

    /// List every active claim, most recently active first.
    pub async fn list(pool: &PgPool) -> Result<Vec<ChatLockClaim>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM chat_lock_claims ORDER BY last_activity DESC, id DESC");
        sqlx::query_as::<_, ChatLockClaim>(&query)
            .fetch_all(pool)
            .await
    }

    /// Insert a claim for `(chat_id, user_id)`.
    ///
    /// Uses `INSERT ... ON CONFLICT DO NOTHING` against the unique constraint
    /// on `chat_id`. If the insert succeeds, the new claim is returned. If
    /// another session already holds the conversation, `None` is returned.
    pub async fn insert(
        pool: &PgPool,
        chat_id: &str,
        user_id: &str,
    ) -> Result<Option<ChatLockClaim>, sqlx::Error> {
        let query = format!(
            "INSERT INTO chat_lock_claims (chat_id, user_id) \
             VALUES ($1, $2) \
             ON CONFLICT ON CONSTRAINT {CLAIM_UNIQUE_CONSTRAINT} DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChatLockClaim>(&query)
            .bind(chat_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Refresh `last_activity` on a held claim.
    ///
    /// Returns `false` if no claim matches `(chat_id, user_id)`.
    pub async fn touch(pool: &PgPool, chat_id: &str, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE chat_lock_claims SET last_activity = NOW() \
             WHERE chat_id = $1 AND user_id = $2",
        )
        .bind(chat_id)
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a claim. Only the holder (matching user_id) can delete.
    ///
    /// Returns `true` if a claim was deleted, `false` if none matched.
    pub async fn delete(pool: &PgPool, chat_id: &str, user_id: &str) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM chat_lock_claims WHERE chat_id = $1 AND user_id = $2")
                .bind(chat_id)
                .bind(user_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every claim whose `last_activity` is older than `cutoff` and
    /// return the reclaimed rows.
    pub async fn delete_stale(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<ChatLockClaim>, sqlx::Error> {
        let query = format!(
            "DELETE FROM chat_lock_claims WHERE last_activity < $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChatLockClaim>(&query)
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }
}
