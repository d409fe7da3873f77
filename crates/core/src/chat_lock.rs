//! Conversation claim constants, types, and validation.
//!
//! A claim gives one agent exclusive interaction rights over an external
//! conversation. The claim row itself lives in the shared store; this module
//! only defines the timing constants, the validation rules applied before any
//! store round trip, and the change-event protocol every layer speaks.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{ChatId, UserId};

// ---------------------------------------------------------------------------
// Timing constants
// ---------------------------------------------------------------------------

/// How often a holding session refreshes `last_activity` (in seconds).
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Claims whose `last_activity` is older than this are reclaimed by the
/// sweeper (5 minutes, i.e. ten missed heartbeats).
pub const DEFAULT_STALE_CLAIM_SECS: i64 = 300;

/// Slowest heartbeat a session may be configured with. Sessions may beat
/// faster, never slower.
pub const MAX_HEARTBEAT_INTERVAL_SECS: u64 = HEARTBEAT_INTERVAL_SECS;

/// Lower bound for the stale threshold: two of the slowest heartbeats, so a
/// live holder always refreshes at least once per threshold window.
pub const MIN_STALE_CLAIM_SECS: i64 = 2 * MAX_HEARTBEAT_INTERVAL_SECS as i64;

/// How often the stale-claim sweeper runs (in seconds).
pub const CLAIM_SWEEP_INTERVAL_SECS: u64 = 60;

// ---------------------------------------------------------------------------
// Store constants
// ---------------------------------------------------------------------------

/// Postgres `LISTEN`/`NOTIFY` channel carrying claim row changes.
pub const NOTIFY_CHANNEL: &str = "chat_lock_claims";

/// Name of the uniqueness constraint on `chat_lock_claims.chat_id`.
pub const CLAIM_UNIQUE_CONSTRAINT: &str = "uq_chat_lock_claims_chat_id";

/// Maximum length (bytes) of a chat or user identifier.
pub const MAX_ID_LEN: usize = 255;

// ---------------------------------------------------------------------------
// Lock status
// ---------------------------------------------------------------------------

/// Result of an acquire attempt, as presented to the agent UI.
///
/// `is_locked` means "locked by someone else": a session that holds the
/// claim itself sees `is_locked == false`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockStatus {
    pub is_locked: bool,
    pub locked_by_user: Option<UserId>,
}

impl LockStatus {
    /// The caller may interact with the conversation.
    pub fn unlocked() -> Self {
        Self::default()
    }

    /// Another agent holds the conversation. `holder` is `None` when the
    /// holder could not be determined (the claim vanished between the failed
    /// insert and the re-read).
    pub fn locked_by(holder: Option<UserId>) -> Self {
        Self {
            is_locked: true,
            locked_by_user: holder,
        }
    }
}

// ---------------------------------------------------------------------------
// Change events
// ---------------------------------------------------------------------------

/// A change to a claim row, delivered to subscribers of the store.
///
/// Serialized with an internally-tagged `"type"` discriminator, matching the
/// payload the database trigger emits after renaming `op`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ClaimEvent {
    /// A claim row was inserted.
    #[serde(rename = "claim.acquired")]
    Acquired { chat_id: ChatId, user_id: UserId },

    /// A claim row was deleted (release or sweep).
    #[serde(rename = "claim.released")]
    Released { chat_id: ChatId, user_id: UserId },
}

impl ClaimEvent {
    /// The conversation this event concerns.
    pub fn chat_id(&self) -> &str {
        match self {
            ClaimEvent::Acquired { chat_id, .. } | ClaimEvent::Released { chat_id, .. } => chat_id,
        }
    }

    /// The agent that held (or now holds) the claim.
    pub fn user_id(&self) -> &str {
        match self {
            ClaimEvent::Acquired { user_id, .. } | ClaimEvent::Released { user_id, .. } => user_id,
        }
    }

    pub fn is_release(&self) -> bool {
        matches!(self, ClaimEvent::Released { .. })
    }

    /// Dot-separated event name used in logs and the SSE `event:` field.
    pub fn event_type(&self) -> &'static str {
        match self {
            ClaimEvent::Acquired { .. } => "claim.acquired",
            ClaimEvent::Released { .. } => "claim.released",
        }
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

fn validate_id(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    if value.len() > MAX_ID_LEN {
        return Err(format!(
            "{field} must be at most {MAX_ID_LEN} bytes, got {}",
            value.len()
        ));
    }
    Ok(())
}

/// Validate the `(chat_id, user_id)` pair every claim operation is keyed on.
pub fn validate_claim_ref(chat_id: &str, user_id: &str) -> Result<(), String> {
    validate_id("chat_id", chat_id)?;
    validate_id("user_id", user_id)
}

/// Validate a chat id on its own (status queries and subscriptions).
pub fn validate_chat_id(chat_id: &str) -> Result<(), String> {
    validate_id("chat_id", chat_id)
}

/// Validate a stale-claim threshold in seconds.
pub fn validate_stale_threshold(secs: i64) -> Result<(), String> {
    if secs < MIN_STALE_CLAIM_SECS {
        return Err(format!(
            "Stale claim threshold must be at least {MIN_STALE_CLAIM_SECS} seconds, got {secs}"
        ));
    }
    Ok(())
}

/// Validate a session heartbeat interval.
pub fn validate_heartbeat_interval(interval: Duration) -> Result<(), String> {
    if interval.is_zero() {
        return Err("Heartbeat interval must be greater than zero".into());
    }
    if interval > Duration::from_secs(MAX_HEARTBEAT_INTERVAL_SECS) {
        return Err(format!(
            "Heartbeat interval must be at most {MAX_HEARTBEAT_INTERVAL_SECS} seconds, got {:?}",
            interval
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
