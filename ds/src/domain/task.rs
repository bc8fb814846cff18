//! Synthetic tasks

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Priority;

/// Task identifier
pub type TaskId = u32;

/// A synthetic job with a declared cost and a priority class
///
/// Tasks are immutable once created; the orchestrator moves them between the
/// arrival pool, the pending set and a unit queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    /// Declared execution cost in time units
    pub cost: f64,

    #[serde(default)]
    pub priority: Priority,
}

impl Task {
    /// Create a new task
    pub fn new(id: TaskId, cost: f64, priority: Priority) -> Self {
        Self { id, cost, priority }
    }

    /// Simulated duration of this task on a unit with the given capacity
    ///
    /// `time_scale` is the wall time, in seconds, of one cost unit. A duration
    /// too large for `Duration` saturates at `Duration::MAX`.
    pub fn duration_on(&self, capacity: f64, time_scale: f64) -> Duration {
        let secs = self.cost / capacity * time_scale;
        debug!(task_id = self.id, capacity, time_scale, secs, "Task::duration_on: called");
        self.try_duration_on(capacity, time_scale)
            .unwrap_or(if secs > 0.0 { Duration::MAX } else { Duration::ZERO })
    }

    /// Like [`Task::duration_on`], but `None` when the result is not representable
    pub fn try_duration_on(&self, capacity: f64, time_scale: f64) -> Option<Duration> {
        Duration::try_from_secs_f64(self.cost / capacity * time_scale).ok()
    }
}
