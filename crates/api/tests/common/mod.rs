#![allow(dead_code)]

use std::sync::Arc;

use agentdesk_api::config::ServerConfig;
use agentdesk_api::router::build_app_router;
use agentdesk_api::state::AppState;
use agentdesk_events::EventBus;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        claim_stale_secs: 300,
        claim_sweep_interval_secs: 60,
    }
}

/// Build test state with its own event bus. No relay is spawned; tests that
/// need change events publish to `state.event_bus` directly.
pub fn test_state(pool: PgPool) -> AppState {
    AppState::new(pool, test_config(), Arc::new(EventBus::default()))
}

/// Build the full application router with all middleware layers, using the
/// given database pool.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_router(test_state(pool), &test_config())
}

/// Build the router over existing state.
pub fn build_test_app_with_state(state: AppState) -> Router {
    build_app_router(state, &test_config())
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST a JSON body as `agent`. `None` sends no `X-Agent-Id` header.
pub async fn post_json_as(
    app: Router,
    uri: &str,
    agent: Option<&str>,
    body: serde_json::Value,
) -> Response<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(agent) = agent {
        builder = builder.header("x-agent-id", agent);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// POST `/api/v1/chat-locks/{action}` for `chat_id` as `agent` and return
/// the `data` payload.
pub async fn claim_action(
    app: Router,
    action: &str,
    agent: &str,
    chat_id: &str,
) -> serde_json::Value {
    let response = post_json_as(
        app,
        &format!("/api/v1/chat-locks/{action}"),
        Some(agent),
        serde_json::json!({ "chat_id": chat_id }),
    )
    .await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    body_json(response).await["data"].clone()
}
