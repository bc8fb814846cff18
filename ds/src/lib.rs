//! dispatchsim - discrete-time load-balanced task dispatch simulator
//!
//! A fixed pool of synthetic tasks arrives over time (exponential
//! inter-arrival gaps), waits in a pending set, is picked by a scheduling
//! policy and placed on the least-loaded execution unit. Units are tokio tasks
//! that simulate work by sleeping `cost / capacity` and report completions,
//! heartbeats and their exit back to the [`Orchestrator`], which produces a
//! [`SimulationReport`] once every task has completed.

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod orchestrator;
pub mod scheduler;
pub mod worker;

pub use config::{Config, SimulationConfig};
pub use domain::{Priority, Task, TaskId, UnitConfig, UnitId, UnitState};
pub use error::SimError;
pub use orchestrator::{Orchestrator, SimulationReport, WaitReference};
pub use scheduler::{PendingSet, PolicyKind, ScheduleError, SchedulingPolicy};
pub use worker::{MetricsFactory, MetricsProvider, MetricsSource};
