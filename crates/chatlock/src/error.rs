//! Error taxonomy for claim operations.
//!
//! - [`InsertError::AlreadyClaimed`] is expected and non-fatal: it surfaces
//!   to the UI as "locked by <holder>".
//! - [`StoreError`] is indeterminate: the caller must not assume it holds
//!   the claim.
//! - Heartbeat failures never become errors; they are logged where they
//!   happen.

/// A store round trip failed (network, permission, unexpected).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store is not reachable or refused the operation.
    #[error("Claim store unavailable: {0}")]
    Unavailable(String),
}

/// Failure modes of inserting a claim row.
#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    /// The uniqueness constraint on `chat_id` rejected the insert: a
    /// concurrent acquire won.
    #[error("Conversation {chat_id} is already claimed")]
    AlreadyClaimed { chat_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors surfaced by [`ChatSessionLock`](crate::ChatSessionLock) operations.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The chat or user id failed validation; no store round trip was made.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
