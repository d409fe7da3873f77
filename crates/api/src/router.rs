//! HTTP surface of the claim service.
//!
//! The binary and the router tests both call [`build_app_router`], so every
//! request in a test crosses the same layers an agent's request does.

use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::ServerConfig;
use crate::middleware::agent::AGENT_ID_HEADER;
use crate::routes;
use crate::state::AppState;

/// Header carrying the per-request id, generated when the client sends none.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Routes for `/health` and `/api/v1/chat-locks`, wrapped in the service
/// layers.
///
/// Outermost first, a request passes CORS, gets a request id, is traced,
/// has the id copied to its response, is bounded by the configured timeout,
/// and finally has any handler panic turned into a 500. The timeout bounds
/// the time to response headers only, so the SSE change feed stays open.
pub fn build_app_router(state: AppState, config: &ServerConfig) -> Router {
    let cors = build_cors_layer(config);
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        // Layers wrap bottom-up: the last one added sees the request first.
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// CORS for the agent UI origins in `CORS_ORIGINS`.
///
/// Browsers may send `GET`/`POST` with a JSON body and the agent id header.
/// An unparsable origin panics during startup.
pub fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(AGENT_ID_HEADER)])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
