//! Simulation error types

use thiserror::Error;

use crate::domain::UnitId;

/// Errors that abort a simulation
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Unknown scheduling policy: {name} (expected one of: first-come, shortest-job-first, priority)")]
    UnknownPolicy { name: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Queue for unit {unit} closed before shutdown")]
    UnitQueueClosed { unit: UnitId },

    #[error("Unit {unit} failed to join: {reason}")]
    UnitJoin { unit: UnitId, reason: String },
}
