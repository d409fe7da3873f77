//! Route definitions for conversation claims.
//!
//! Mutating endpoints identify the caller via the `AgentId` extractor.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::chat_lock;
use crate::state::AppState;

/// Claim routes mounted at `/chat-locks`.
///
/// ```text
/// GET  /                    -> list_claims
/// POST /acquire             -> acquire
/// POST /heartbeat           -> heartbeat
/// POST /release             -> release
/// GET  /{chat_id}           -> get_claim
/// GET  /{chat_id}/events    -> claim_events
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(chat_lock::list_claims))
        .route("/acquire", post(chat_lock::acquire))
        .route("/heartbeat", post(chat_lock::heartbeat))
        .route("/release", post(chat_lock::release))
        .route("/{chat_id}", get(chat_lock::get_claim))
        .route("/{chat_id}/events", get(chat_lock::claim_events))
}
