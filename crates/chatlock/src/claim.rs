//! The acquire decision shared by agent sessions and the HTTP service.

use agentdesk_core::chat_lock::LockStatus;
use agentdesk_core::types::UserId;

use crate::error::{InsertError, StoreError};
use crate::store::ClaimStore;

/// What an acquire attempt observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// No claim existed and ours was inserted.
    Acquired,
    /// The caller already held the claim; nothing was written.
    Reentered,
    /// Another agent holds the claim. `None` when the holder vanished before
    /// it could be read back after a lost insert race.
    LockedBy(Option<UserId>),
}

impl AcquireOutcome {
    /// Whether the caller holds the claim after this attempt.
    pub fn holds_claim(&self) -> bool {
        matches!(self, AcquireOutcome::Acquired | AcquireOutcome::Reentered)
    }

    /// The UI-facing view of this outcome.
    pub fn status(&self) -> LockStatus {
        match self {
            AcquireOutcome::Acquired | AcquireOutcome::Reentered => LockStatus::unlocked(),
            AcquireOutcome::LockedBy(holder) => LockStatus::locked_by(holder.clone()),
        }
    }
}

/// Attempt to make `user_id` the exclusive holder of `chat_id`.
///
/// Reads first so the common cases (held by someone else, re-entry) skip the
/// insert. The read can race with a concurrent acquire; the store's
/// uniqueness constraint settles that race at insert time, and the loser
/// re-reads the winner for display. Store failures other than the
/// uniqueness violation are returned as-is: the caller holds nothing.
pub async fn try_acquire<S>(
    store: &S,
    chat_id: &str,
    user_id: &str,
) -> Result<AcquireOutcome, StoreError>
where
    S: ClaimStore + ?Sized,
{
    match store.read_claim(chat_id).await? {
        Some(holder) if holder == user_id => return Ok(AcquireOutcome::Reentered),
        Some(holder) => return Ok(AcquireOutcome::LockedBy(Some(holder))),
        None => {}
    }

    match store.insert_claim(chat_id, user_id).await {
        Ok(()) => Ok(AcquireOutcome::Acquired),
        Err(InsertError::AlreadyClaimed { .. }) => {
            let holder = match store.read_claim(chat_id).await {
                Ok(holder) => holder,
                Err(e) => {
                    tracing::warn!(
                        chat_id,
                        error = %e,
                        "Lost claim race and could not read the winner"
                    );
                    None
                }
            };
            match holder {
                // Another session of the same agent won.
                Some(holder) if holder == user_id => Ok(AcquireOutcome::Reentered),
                holder => Ok(AcquireOutcome::LockedBy(holder)),
            }
        }
        Err(InsertError::Store(e)) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
