//! Domain types shared by every agentdesk crate.
//!
//! This crate performs no I/O so that the database layer, the claim session
//! component, and the HTTP service can all agree on identifiers, claim
//! timing constants, validation rules, and the change-event protocol.

pub mod chat_lock;
pub mod error;
pub mod types;
