use std::sync::Arc;

use agentdesk_chatlock::PgClaimStore;
use agentdesk_events::EventBus;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: agentdesk_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Claim store used by the acquire/heartbeat/release handlers.
    pub claims: Arc<PgClaimStore>,
    /// Claim change events, fed by the relay from database notifications.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    /// Build state whose claim store publishes through `event_bus`.
    pub fn new(pool: agentdesk_db::DbPool, config: ServerConfig, event_bus: Arc<EventBus>) -> Self {
        let claims = Arc::new(PgClaimStore::new(pool.clone(), Arc::clone(&event_bus)));
        Self {
            pool,
            config: Arc::new(config),
            claims,
            event_bus,
        }
    }
}
