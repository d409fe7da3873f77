//! Agent identity extractor for Axum handlers.

use agentdesk_core::error::CoreError;
use agentdesk_core::types::UserId;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;

/// Header carrying the calling agent's id.
pub const AGENT_ID_HEADER: &str = "x-agent-id";

/// The calling agent, taken from the `X-Agent-Id` header.
///
/// Identity is asserted by the front end, which authenticates agents on its
/// own; this service only needs a stable id to key claims on.
///
/// ```ignore
/// async fn my_handler(agent: AgentId) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %agent.0, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AgentId(pub UserId);

impl<S: Send + Sync> FromRequestParts<S> for AgentId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(AGENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("Missing X-Agent-Id header".into()))
            })?;

        Ok(AgentId(value.to_string()))
    }
}
