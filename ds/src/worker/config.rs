//! Execution unit configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Settings shared by every execution unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Interval between liveness events while a unit is idle
    #[serde(rename = "heartbeat-interval-ms", default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
}

fn default_heartbeat_interval_ms() -> u64 {
    debug!("default_heartbeat_interval_ms: called");
    1000
}

impl Default for WorkerConfig {
    fn default() -> Self {
        debug!("WorkerConfig::default: called");
        Self {
            heartbeat_interval_ms: 1000,
        }
    }
}

impl WorkerConfig {
    /// Get the heartbeat interval as a Duration
    pub fn heartbeat_interval(&self) -> Duration {
        debug!(heartbeat_interval_ms = %self.heartbeat_interval_ms, "WorkerConfig::heartbeat_interval: called");
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.heartbeat_interval_ms, 1000);
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = WorkerConfig {
            heartbeat_interval_ms: 0,
        };
        assert_eq!(config.heartbeat_interval(), Duration::from_millis(1));
    }
}
