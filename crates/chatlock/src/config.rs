use std::time::Duration;

use agentdesk_core::chat_lock::{validate_heartbeat_interval, HEARTBEAT_INTERVAL_SECS};

use crate::error::LockError;

/// Per-session tuning for [`ChatSessionLock`](crate::ChatSessionLock).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Interval between `last_activity` refreshes while holding a claim.
    /// Must not exceed `MAX_HEARTBEAT_INTERVAL_SECS`, or the sweeper may
    /// reclaim a live holder.
    pub heartbeat_interval: Duration,
}

impl SessionConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default |
    /// |--------------------------------|---------|
    /// | `CHAT_HEARTBEAT_INTERVAL_SECS` | `30`    |
    ///
    /// An unparsable value, zero, or an interval slower than the sweeper
    /// tolerates is a [`LockError::Validation`].
    pub fn from_env() -> Result<Self, LockError> {
        let secs = match std::env::var("CHAT_HEARTBEAT_INTERVAL_SECS") {
            Ok(v) => v.parse::<u64>().map_err(|_| {
                LockError::Validation(format!(
                    "CHAT_HEARTBEAT_INTERVAL_SECS must be a valid u64, got {v:?}"
                ))
            })?,
            Err(_) => HEARTBEAT_INTERVAL_SECS,
        };

        let config = Self {
            heartbeat_interval: Duration::from_secs(secs),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LockError> {
        validate_heartbeat_interval(self.heartbeat_interval).map_err(LockError::Validation)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn heartbeat_slower_than_the_sweeper_allows_is_rejected() {
        let config = SessionConfig {
            heartbeat_interval: Duration::from_secs(600),
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LockError::Validation(msg) if msg.contains("at most")));
    }

    #[test]
    fn zero_heartbeat_is_rejected() {
        let config = SessionConfig {
            heartbeat_interval: Duration::ZERO,
        };
        assert!(config.validate().is_err());
    }
}
