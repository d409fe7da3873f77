//! Handlers for conversation claims.
//!
//! Acquire, heartbeat, and release mirror the session component's store
//! contract for browser clients. Being locked by another agent is a normal
//! outcome and is returned as data, never as an error status.

use std::convert::Infallible;

use agentdesk_chatlock::{try_acquire, AcquireOutcome, ClaimStore};
use agentdesk_core::chat_lock::{validate_chat_id, validate_claim_ref, ClaimEvent};
use agentdesk_core::error::CoreError;
use agentdesk_db::models::chat_lock::ClaimActionRequest;
use agentdesk_db::repositories::ChatLockRepo;
use agentdesk_events::BusMessage;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::Stream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::error::{AppError, AppResult};
use crate::middleware::agent::AgentId;
use crate::middleware::json::AppJson;
use crate::response::DataResponse;
use crate::state::AppState;

fn validate_action(chat_id: &str, user_id: &str) -> AppResult<()> {
    validate_claim_ref(chat_id, user_id).map_err(|msg| AppError::Core(CoreError::Validation(msg)))
}

// ---------------------------------------------------------------------------
// Claim Endpoints
// ---------------------------------------------------------------------------

/// POST /api/v1/chat-locks/acquire
///
/// Claim a conversation for the calling agent. Returns `is_locked: true`
/// with the holder when another agent owns it.
pub async fn acquire(
    AgentId(user_id): AgentId,
    State(state): State<AppState>,
    AppJson(input): AppJson<ClaimActionRequest>,
) -> AppResult<impl IntoResponse> {
    validate_action(&input.chat_id, &user_id)?;

    let outcome = try_acquire(&*state.claims, &input.chat_id, &user_id).await?;

    match &outcome {
        AcquireOutcome::Acquired => {
            tracing::info!(chat_id = %input.chat_id, %user_id, "Claim acquired");
        }
        AcquireOutcome::Reentered => {
            tracing::debug!(chat_id = %input.chat_id, %user_id, "Claim re-entered");
        }
        AcquireOutcome::LockedBy(holder) => {
            tracing::debug!(
                chat_id = %input.chat_id,
                %user_id,
                holder = holder.as_deref().unwrap_or("unknown"),
                "Claim held by another agent"
            );
        }
    }

    Ok(Json(DataResponse {
        data: outcome.status(),
    }))
}

/// POST /api/v1/chat-locks/heartbeat
///
/// Refresh `last_activity` on the caller's claim. `refreshed: false` means
/// the caller no longer holds it.
pub async fn heartbeat(
    AgentId(user_id): AgentId,
    State(state): State<AppState>,
    AppJson(input): AppJson<ClaimActionRequest>,
) -> AppResult<impl IntoResponse> {
    validate_action(&input.chat_id, &user_id)?;

    let refreshed = state.claims.touch_claim(&input.chat_id, &user_id).await?;
    if !refreshed {
        tracing::warn!(chat_id = %input.chat_id, %user_id, "Heartbeat for a claim not held");
    }

    Ok(Json(DataResponse {
        data: serde_json::json!({ "refreshed": refreshed }),
    }))
}

/// POST /api/v1/chat-locks/release
///
/// Release the caller's claim. Releasing a claim that is not held is a
/// no-op and reports `released: false`.
pub async fn release(
    AgentId(user_id): AgentId,
    State(state): State<AppState>,
    AppJson(input): AppJson<ClaimActionRequest>,
) -> AppResult<impl IntoResponse> {
    validate_action(&input.chat_id, &user_id)?;

    let released = state.claims.delete_claim(&input.chat_id, &user_id).await?;
    if released {
        tracing::info!(chat_id = %input.chat_id, %user_id, "Claim released");
    }

    Ok(Json(DataResponse {
        data: serde_json::json!({ "released": released }),
    }))
}

/// GET /api/v1/chat-locks/{chat_id}
pub async fn get_claim(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    validate_chat_id(&chat_id).map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    let claim = ChatLockRepo::find_by_chat(&state.pool, &chat_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "ChatLockClaim",
            id: chat_id,
        }))?;

    Ok(Json(DataResponse { data: claim }))
}

/// GET /api/v1/chat-locks
pub async fn list_claims(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let claims = ChatLockRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: claims }))
}

// ---------------------------------------------------------------------------
// Change Feed
// ---------------------------------------------------------------------------

/// SSE event name sent when changes may have been missed (the feed lagged or
/// the server's notification connection dropped) and the client must
/// re-read the claim.
const RESYNC_EVENT: &str = "claim.resync";

/// GET /api/v1/chat-locks/{chat_id}/events
///
/// Server-sent events for every claim change on `chat_id`. Blocked agents
/// listen here and re-acquire when they see `claim.released`.
pub async fn claim_events(
    State(state): State<AppState>,
    Path(chat_id): Path<String>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    validate_chat_id(&chat_id).map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;

    tracing::debug!(%chat_id, "Claim event feed opened");
    let receiver = state.event_bus.subscribe();
    let stream = BroadcastStream::new(receiver).filter_map(move |received| match received {
        Ok(BusMessage::Claim(event)) if event.chat_id() == chat_id => claim_event(&event).map(Ok),
        Ok(BusMessage::Claim(_)) => None,
        Ok(BusMessage::Resync) => {
            tracing::debug!(%chat_id, "Claim event feed resync");
            Some(Ok(Event::default().event(RESYNC_EVENT).data("reconnected")))
        }
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(%chat_id, skipped, "Claim event feed lagged");
            Some(Ok(Event::default()
                .event(RESYNC_EVENT)
                .data(skipped.to_string())))
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn claim_event(event: &ClaimEvent) -> Option<Event> {
    match Event::default().event(event.event_type()).json_data(event) {
        Ok(sse) => Some(sse),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode claim event");
            None
        }
    }
}
