//! The control loop
//!
//! Admits arrivals, asks the scheduling policy for the next task, places it
//! on the least-loaded unit and applies unit events to the load table. The
//! [`Orchestrator`] is the only writer of unit loads.

mod arrival;
mod balancer;
mod config;
mod core;
mod stats;

pub use self::core::Orchestrator;
pub use arrival::ArrivalGenerator;
pub use balancer::LoadBalancer;
pub use config::OrchestratorConfig;
pub use stats::{
    CompletionRecord, DispatchRecord, ExitRecord, HeartbeatRecord, LoadSample, SimulationReport, StatsCollector,
    UnitUsage, WaitReference,
};
