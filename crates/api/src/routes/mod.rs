pub mod chat_lock;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /chat-locks                                      list active claims
/// /chat-locks/acquire                              acquire (POST)
/// /chat-locks/heartbeat                            refresh (POST)
/// /chat-locks/release                              release (POST)
/// /chat-locks/{chat_id}                            current claim
/// /chat-locks/{chat_id}/events                     SSE change feed
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/chat-locks", chat_lock::router())
}
