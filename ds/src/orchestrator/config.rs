//! Orchestrator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Control loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Fixed quantum between control-loop ticks
    #[serde(rename = "tick-ms", default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Capacity of the shared unit event channel
    #[serde(rename = "event-buffer", default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_tick_ms() -> u64 {
    debug!("default_tick_ms: called");
    100
}

fn default_event_buffer() -> usize {
    debug!("default_event_buffer: called");
    1024
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        debug!("OrchestratorConfig::default: called");
        Self {
            tick_ms: 100,
            event_buffer: 1024,
        }
    }
}

impl OrchestratorConfig {
    /// Get the tick quantum as a Duration
    pub fn tick(&self) -> Duration {
        debug!(tick_ms = %self.tick_ms, "OrchestratorConfig::tick: called");
        Duration::from_millis(self.tick_ms.max(1))
    }
}
