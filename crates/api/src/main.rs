use std::net::SocketAddr;
use std::sync::Arc;

use agentdesk_events::{ClaimRelay, EventBus};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agentdesk_api::background::stale_claims;
use agentdesk_api::config::ServerConfig;
use agentdesk_api::router::build_app_router;
use agentdesk_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "agentdesk_api=debug,agentdesk_chatlock=debug,agentdesk_events=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        claim_stale_secs = config.claim_stale_secs,
        "Loaded server configuration"
    );

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = agentdesk_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    agentdesk_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    agentdesk_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Event bus + claim relay ---
    let event_bus = Arc::new(EventBus::default());
    let background_cancel = CancellationToken::new();

    let relay_handle =
        ClaimRelay::new(pool.clone(), Arc::clone(&event_bus)).spawn(background_cancel.clone());

    // --- Stale claim sweeper ---
    let sweeper_handle = tokio::spawn(stale_claims::run(
        pool.clone(),
        config.claim_stale_secs,
        config.claim_sweep_interval(),
        background_cancel.clone(),
    ));

    tracing::info!("Background services started (claim relay, stale claim sweeper)");

    // --- App state + router ---
    let state = AppState::new(pool, config.clone(), Arc::clone(&event_bus));
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    background_cancel.cancel();
    let timeout = config.shutdown_timeout();
    let _ = tokio::time::timeout(timeout, relay_handle).await;
    let _ = tokio::time::timeout(timeout, sweeper_handle).await;
    tracing::info!("Background services stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
