use std::time::Duration;

use agentdesk_core::chat_lock::{
    validate_stale_threshold, CLAIM_SWEEP_INTERVAL_SECS, DEFAULT_STALE_CLAIM_SECS,
};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. In production,
/// override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long to wait for background tasks after the listener closes
    /// (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Claims whose heartbeat is older than this are reclaimed by the
    /// sweeper (default: `300`).
    pub claim_stale_secs: i64,
    /// How often the sweeper runs, in seconds (default: `60`).
    pub claim_sweep_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                 |
    /// |-----------------------------|-------------------------|
    /// | `HOST`                      | `0.0.0.0`               |
    /// | `PORT`                      | `3000`                  |
    /// | `CORS_ORIGINS`              | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                    |
    /// | `CLAIM_STALE_SECS`          | `300`                   |
    /// | `CLAIM_SWEEP_INTERVAL_SECS` | `60`                    |
    ///
    /// Panics on unparseable values or a stale threshold shorter than two
    /// heartbeat intervals.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let claim_stale_secs: i64 = std::env::var("CLAIM_STALE_SECS")
            .map(|v| v.parse().expect("CLAIM_STALE_SECS must be a valid i64"))
            .unwrap_or(DEFAULT_STALE_CLAIM_SECS);
        if let Err(msg) = validate_stale_threshold(claim_stale_secs) {
            panic!("Invalid CLAIM_STALE_SECS: {msg}");
        }

        let claim_sweep_interval_secs: u64 = std::env::var("CLAIM_SWEEP_INTERVAL_SECS")
            .map(|v| {
                v.parse()
                    .expect("CLAIM_SWEEP_INTERVAL_SECS must be a valid u64")
            })
            .unwrap_or(CLAIM_SWEEP_INTERVAL_SECS);
        assert!(
            claim_sweep_interval_secs > 0,
            "CLAIM_SWEEP_INTERVAL_SECS must be greater than zero"
        );

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            claim_stale_secs,
            claim_sweep_interval_secs,
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn claim_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.claim_sweep_interval_secs)
    }
}
