//! Message types exchanged between the orchestrator and execution units

use std::time::Duration;

use tokio::time::Instant;

use crate::domain::{Task, TaskId, UnitId};

/// Commands sent to a unit's inbound queue
#[derive(Debug, Clone)]
pub enum UnitCommand {
    /// Simulate this task
    Run(Task),

    /// Finish and emit an exit event
    Stop,
}

/// Events sent from units to the orchestrator over the shared channel
#[derive(Debug, Clone)]
pub enum UnitEvent {
    /// A task finished simulating
    Completion {
        unit: UnitId,
        task_id: TaskId,
        /// Measured time spent on the task
        duration: Duration,
        at: Instant,
    },

    /// Periodic liveness report from an idle unit
    Heartbeat {
        unit: UnitId,
        pid: u32,
        cpu_percent: f32,
        at: Instant,
    },

    /// The unit consumed the stop command and is terminating
    Exit { unit: UnitId, pid: u32, at: Instant },
}

impl UnitEvent {
    /// The unit that emitted this event
    pub fn unit(&self) -> UnitId {
        match self {
            Self::Completion { unit, .. } | Self::Heartbeat { unit, .. } | Self::Exit { unit, .. } => *unit,
        }
    }

    /// When the event was emitted
    pub fn at(&self) -> Instant {
        match self {
            Self::Completion { at, .. } | Self::Heartbeat { at, .. } | Self::Exit { at, .. } => *at,
        }
    }
}

/// What a unit reports back when it is joined
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitSummary {
    pub unit: UnitId,
    pub completed: u64,
    /// Total time spent simulating tasks
    pub busy: Duration,
}
