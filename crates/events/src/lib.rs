//! Claim change fan-out for agentdesk.
//!
//! - [`EventBus`]: in-process publish/subscribe hub for [`ClaimEvent`]s
//!   backed by `tokio::sync::broadcast`, plus resync signals.
//! - [`ChatSubscription`]: a receiver narrowed to one conversation.
//! - [`ClaimRelay`]: background service that forwards database
//!   notifications onto the bus.
//!
//! [`ClaimEvent`]: agentdesk_core::chat_lock::ClaimEvent

pub mod bus;
pub mod relay;
pub mod subscription;

pub use bus::{BusMessage, EventBus};
pub use relay::ClaimRelay;
pub use subscription::ChatSubscription;
