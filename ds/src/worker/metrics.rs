//! CPU metrics reported in heartbeats
//!
//! The source is chosen once at startup. Every provider degrades to 0.0
//! instead of failing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sysinfo::{Pid, System};
use tracing::debug;

/// Supplies the CPU figure carried by a heartbeat
pub trait MetricsProvider: Send {
    /// CPU utilisation in percent; 0.0 when unavailable
    fn cpu_percent(&mut self) -> f32;
}

/// Builds one provider per execution unit
pub type MetricsFactory = Arc<dyn Fn() -> Box<dyn MetricsProvider> + Send + Sync>;

/// Provider that always reports zero
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsProvider for NoopMetrics {
    fn cpu_percent(&mut self) -> f32 {
        0.0
    }
}

/// CPU usage of the current process, sampled through sysinfo
///
/// The first sample after creation is 0.0 since usage is measured between
/// two refreshes.
pub struct ProcessMetrics {
    system: System,
    pid: Option<Pid>,
}

impl ProcessMetrics {
    pub fn new() -> Self {
        let pid = sysinfo::get_current_pid().ok();
        debug!(?pid, "ProcessMetrics::new: called");
        Self {
            system: System::new(),
            pid,
        }
    }
}

impl Default for ProcessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsProvider for ProcessMetrics {
    fn cpu_percent(&mut self) -> f32 {
        let Some(pid) = self.pid else {
            return 0.0;
        };
        if !self.system.refresh_process(pid) {
            debug!(?pid, "ProcessMetrics::cpu_percent: process not found");
            return 0.0;
        }
        self.system
            .process(pid)
            .map(|p| p.cpu_usage())
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }
}

/// Which provider heartbeats use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsSource {
    #[default]
    None,
    Process,
}

impl MetricsSource {
    /// Factory producing a provider of this kind for each unit
    pub fn factory(self) -> MetricsFactory {
        debug!(source = ?self, "MetricsSource::factory: called");
        match self {
            Self::None => Arc::new(|| Box::new(NoopMetrics) as Box<dyn MetricsProvider>),
            Self::Process => Arc::new(|| Box::new(ProcessMetrics::new()) as Box<dyn MetricsProvider>),
        }
    }
}
