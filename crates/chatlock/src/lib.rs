//! Exclusive agent claims over external conversations.
//!
//! A [`ChatSessionLock`] gives at most one agent interaction rights over a
//! conversation and tells everyone else who holds it. Mutual exclusion comes
//! solely from the store's uniqueness constraint on `chat_id`; the
//! read-before-insert in [`claim::try_acquire`] only avoids needless failed
//! inserts.
//!
//! - [`ClaimStore`]: the storage boundary (read, insert, touch, delete,
//!   subscribe).
//! - [`PgClaimStore`]: Postgres implementation with `LISTEN`/`NOTIFY`
//!   change delivery.
//! - [`MemoryClaimStore`]: in-process implementation.
//! - [`ChatSessionLock`]: one agent's session over one conversation:
//!   acquire, heartbeat, release, and re-acquire on external release.

pub mod claim;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod memory;
pub mod pg;
pub mod session;
pub mod store;

pub use claim::{try_acquire, AcquireOutcome};
pub use config::SessionConfig;
pub use error::{InsertError, LockError, StoreError};
pub use memory::MemoryClaimStore;
pub use pg::PgClaimStore;
pub use session::{ChatSessionLock, SessionPhase};
pub use store::ClaimStore;
