//! Simulated execution units
//!
//! Each unit runs on its own tokio task, owns one inbound queue and reports
//! completions, heartbeats and its exit on a channel shared by all units.

mod config;
mod core;
mod messages;
mod metrics;

pub use config::WorkerConfig;
pub use self::core::ExecutionUnit;
pub use messages::{UnitCommand, UnitEvent, UnitSummary};
pub use metrics::{MetricsFactory, MetricsProvider, MetricsSource, NoopMetrics, ProcessMetrics};
