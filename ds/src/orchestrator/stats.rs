//! Simulation statistics and the final report
//!
//! Collects per-task response and wait figures, the load time series,
//! the heartbeat and exit logs, and the dispatch log while the control loop
//! runs, then folds them into a [`SimulationReport`] at shutdown.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{TaskId, UnitId, UnitState};
use crate::worker::UnitSummary;

/// Arrival instant that wait time is measured from
///
/// `LatestArrival` measures every completion against the most recent arrival,
/// whichever task that was. `TaskArrival` uses the completed task's own
/// arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaitReference {
    #[default]
    LatestArrival,
    TaskArrival,
}

/// Load of one unit at one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadSample {
    pub at_secs: f64,
    pub load: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    pub unit: UnitId,
    pub pid: u32,
    pub cpu_percent: f32,
    pub at_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitRecord {
    pub unit: UnitId,
    pub pid: u32,
    pub at_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub task_id: TaskId,
    pub unit: UnitId,
    pub at_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub task_id: TaskId,
    pub unit: UnitId,
    pub duration_secs: f64,
    pub wait_secs: f64,
    pub completed_at_secs: f64,
}

/// Per-unit totals reported by the unit itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitUsage {
    pub unit: UnitId,
    pub completed: u64,
    pub busy_secs: f64,
    /// Busy time over total elapsed time
    pub utilization: f64,
}

/// The aggregate produced once at shutdown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub policy: String,
    pub wait_reference: WaitReference,

    pub total_elapsed_secs: f64,
    pub mean_response_secs: f64,
    /// Completed tasks per second of elapsed time
    pub throughput: f64,
    pub response_times: Vec<f64>,
    pub wait_times: Vec<f64>,
    pub mean_wait_secs: f64,
    pub max_wait_secs: f64,
    pub total_wait_secs: f64,

    pub load_history: BTreeMap<UnitId, Vec<LoadSample>>,
    pub heartbeats: Vec<HeartbeatRecord>,
    pub final_loads: Vec<UnitState>,

    pub completions: Vec<CompletionRecord>,
    pub dispatches: Vec<DispatchRecord>,
    pub exits: Vec<ExitRecord>,
    /// Dispatch attempts that found every unit at its cap
    pub deferrals: u64,
    pub units: Vec<UnitUsage>,
}

impl SimulationReport {
    /// Number of completion events processed
    pub fn completed(&self) -> usize {
        self.completions.len()
    }

    /// True when every unit ended with zero load
    pub fn is_clean(&self) -> bool {
        self.final_loads.iter().all(UnitState::is_idle)
    }

    /// Task ids in dispatch order
    pub fn dispatch_order(&self) -> Vec<TaskId> {
        self.dispatches.iter().map(|d| d.task_id).collect()
    }

    /// Highest load ever sampled for a unit
    pub fn peak_load(&self, unit: UnitId) -> u32 {
        self.load_history
            .get(&unit)
            .and_then(|samples| samples.iter().map(|s| s.load).max())
            .unwrap_or(0)
    }
}

/// Accumulates statistics during a run
pub struct StatsCollector {
    origin: Instant,
    wait_reference: WaitReference,
    latest_arrival: Option<Instant>,
    arrivals: HashMap<TaskId, Instant>,

    response_times: Vec<f64>,
    wait_times: Vec<f64>,
    completions: Vec<CompletionRecord>,
    dispatches: Vec<DispatchRecord>,
    heartbeats: Vec<HeartbeatRecord>,
    exits: Vec<ExitRecord>,
    deferrals: u64,
    load_history: BTreeMap<UnitId, Vec<LoadSample>>,
}

impl StatsCollector {
    /// Start collecting; offsets in the report are measured from `origin`
    pub fn new(origin: Instant, wait_reference: WaitReference, units: impl IntoIterator<Item = UnitId>) -> Self {
        debug!(?wait_reference, "StatsCollector::new: called");
        Self {
            origin,
            wait_reference,
            latest_arrival: None,
            arrivals: HashMap::new(),
            response_times: Vec::new(),
            wait_times: Vec::new(),
            completions: Vec::new(),
            dispatches: Vec::new(),
            heartbeats: Vec::new(),
            exits: Vec::new(),
            deferrals: 0,
            load_history: units.into_iter().map(|id| (id, Vec::new())).collect(),
        }
    }

    fn offset(&self, at: Instant) -> f64 {
        at.saturating_duration_since(self.origin).as_secs_f64()
    }

    pub fn record_arrival(&mut self, task_id: TaskId, at: Instant) {
        debug!(task_id, "StatsCollector::record_arrival: called");
        self.latest_arrival = Some(at);
        self.arrivals.insert(task_id, at);
    }

    pub fn record_dispatch(&mut self, task_id: TaskId, unit: UnitId, at: Instant) {
        let at_secs = self.offset(at);
        self.dispatches.push(DispatchRecord { task_id, unit, at_secs });
    }

    pub fn record_deferral(&mut self) {
        self.deferrals += 1;
    }

    /// Record a completion and return the wait time attributed to it
    ///
    /// wait = |turnaround - duration|, where turnaround is measured from the
    /// arrival selected by the configured [`WaitReference`].
    pub fn record_completion(&mut self, task_id: TaskId, unit: UnitId, duration: Duration, at: Instant) -> f64 {
        let own_arrival = self.arrivals.remove(&task_id);
        let reference = match self.wait_reference {
            WaitReference::LatestArrival => self.latest_arrival,
            WaitReference::TaskArrival => own_arrival,
        }
        .unwrap_or(self.origin);

        let completed_at_secs = self.offset(at);
        let turnaround = completed_at_secs - self.offset(reference);
        let duration_secs = duration.as_secs_f64();
        let wait_secs = (turnaround - duration_secs).abs();
        debug!(task_id, unit, turnaround, duration_secs, wait_secs, "StatsCollector::record_completion: called");

        self.response_times.push(duration_secs);
        self.wait_times.push(wait_secs);
        self.completions.push(CompletionRecord {
            task_id,
            unit,
            duration_secs,
            wait_secs,
            completed_at_secs,
        });
        wait_secs
    }

    pub fn record_heartbeat(&mut self, unit: UnitId, pid: u32, cpu_percent: f32, at: Instant) {
        let at_secs = self.offset(at);
        self.heartbeats.push(HeartbeatRecord {
            unit,
            pid,
            cpu_percent,
            at_secs,
        });
    }

    pub fn record_exit(&mut self, unit: UnitId, pid: u32, at: Instant) {
        let at_secs = self.offset(at);
        self.exits.push(ExitRecord { unit, pid, at_secs });
    }

    /// Append one load sample per unit
    pub fn record_loads(&mut self, at: Instant, units: &[UnitState]) {
        let at_secs = self.offset(at);
        for state in units {
            self.load_history
                .entry(state.id)
                .or_default()
                .push(LoadSample { at_secs, load: state.load });
        }
    }

    pub fn completed(&self) -> usize {
        self.completions.len()
    }

    /// Fold everything into the final report
    pub fn finish(
        self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        policy: &str,
        elapsed: Duration,
        final_loads: Vec<UnitState>,
        summaries: &[UnitSummary],
    ) -> SimulationReport {
        debug!(%run_id, completed = self.completions.len(), "StatsCollector::finish: called");
        let total_elapsed_secs = elapsed.as_secs_f64();
        let completed = self.response_times.len();

        let mean_response_secs = mean(&self.response_times);
        let throughput = if total_elapsed_secs > 0.0 {
            completed as f64 / total_elapsed_secs
        } else {
            0.0
        };
        let total_wait_secs: f64 = self.wait_times.iter().sum();
        let mean_wait_secs = mean(&self.wait_times);
        let max_wait_secs = self.wait_times.iter().cloned().fold(0.0, f64::max);

        let units = summaries
            .iter()
            .map(|s| {
                let busy_secs = s.busy.as_secs_f64();
                UnitUsage {
                    unit: s.unit,
                    completed: s.completed,
                    busy_secs,
                    utilization: if total_elapsed_secs > 0.0 {
                        busy_secs / total_elapsed_secs
                    } else {
                        0.0
                    },
                }
            })
            .collect();

        SimulationReport {
            run_id,
            started_at,
            policy: policy.to_string(),
            wait_reference: self.wait_reference,
            total_elapsed_secs,
            mean_response_secs,
            throughput,
            response_times: self.response_times,
            wait_times: self.wait_times,
            mean_wait_secs,
            max_wait_secs,
            total_wait_secs,
            load_history: self.load_history,
            heartbeats: self.heartbeats,
            final_loads,
            completions: self.completions,
            dispatches: self.dispatches,
            exits: self.exits,
            deferrals: self.deferrals,
            units,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
