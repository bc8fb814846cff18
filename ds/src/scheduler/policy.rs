//! Scheduling policies
//!
//! A policy removes exactly one task from the pending set per call. Policies
//! know nothing about units or time.

use thiserror::Error;
use tracing::debug;

use crate::domain::Task;
use crate::error::SimError;

use super::pending::PendingSet;

/// Errors from policy selection
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Pending set is empty")]
    EmptyPending,
}

/// Selects the next task to dispatch
pub trait SchedulingPolicy: Send {
    /// Canonical policy name
    fn name(&self) -> &'static str;

    /// Remove and return one task from `pending`
    fn select(&mut self, pending: &mut PendingSet) -> Result<Task, ScheduleError>;
}

/// The closed set of recognised policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    FirstCome,
    ShortestJobFirst,
    Priority,
}

impl PolicyKind {
    pub fn all() -> [PolicyKind; 3] {
        [Self::FirstCome, Self::ShortestJobFirst, Self::Priority]
    }

    /// Accepted spellings besides the canonical name
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::FirstCome => &["fcfs", "fifo", "rr"],
            Self::ShortestJobFirst => &["sjf"],
            Self::Priority => &["prio"],
        }
    }

    /// Instantiate a fresh policy with its own state
    pub fn build(self) -> Box<dyn SchedulingPolicy> {
        debug!(policy = %self, "PolicyKind::build: called");
        match self {
            Self::FirstCome => Box::new(FirstCome::default()),
            Self::ShortestJobFirst => Box::new(ShortestJobFirst),
            Self::Priority => Box::new(PriorityFirst),
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FirstCome => write!(f, "first-come"),
            Self::ShortestJobFirst => write!(f, "shortest-job-first"),
            Self::Priority => write!(f, "priority"),
        }
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        Self::all()
            .into_iter()
            .find(|kind| kind.to_string() == wanted || kind.aliases().contains(&wanted.as_str()))
            .ok_or_else(|| SimError::UnknownPolicy { name: s.to_string() })
    }
}

/// First-come selection through a circular cursor
///
/// Each call takes the task at `cursor mod len` and leaves the reduced cursor
/// in place. The pending set shrinks after every removal, so this is not a
/// strict round robin: the cursor only ever holds the reduced value, which
/// keeps it at the front of the set.
#[derive(Debug, Default)]
pub struct FirstCome {
    cursor: usize,
}

impl FirstCome {
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl SchedulingPolicy for FirstCome {
    fn name(&self) -> &'static str {
        "first-come"
    }

    fn select(&mut self, pending: &mut PendingSet) -> Result<Task, ScheduleError> {
        debug!(cursor = self.cursor, pending = pending.len(), "FirstCome::select: called");
        if pending.is_empty() {
            return Err(ScheduleError::EmptyPending);
        }
        self.cursor %= pending.len();
        pending.remove(self.cursor).ok_or(ScheduleError::EmptyPending)
    }
}

/// Cheapest declared cost first; ties keep their pending order
#[derive(Debug, Default)]
pub struct ShortestJobFirst;

impl SchedulingPolicy for ShortestJobFirst {
    fn name(&self) -> &'static str {
        "shortest-job-first"
    }

    fn select(&mut self, pending: &mut PendingSet) -> Result<Task, ScheduleError> {
        debug!(pending = pending.len(), "ShortestJobFirst::select: called");
        pending.sort_by(|a, b| a.cost.total_cmp(&b.cost));
        pending.pop_front().ok_or(ScheduleError::EmptyPending)
    }
}

/// Lowest priority class first; ties keep their pending order
#[derive(Debug, Default)]
pub struct PriorityFirst;

impl SchedulingPolicy for PriorityFirst {
    fn name(&self) -> &'static str {
        "priority"
    }

    fn select(&mut self, pending: &mut PendingSet) -> Result<Task, ScheduleError> {
        debug!(pending = pending.len(), "PriorityFirst::select: called");
        pending.sort_by(|a, b| a.priority.cmp(&b.priority));
        pending.pop_front().ok_or(ScheduleError::EmptyPending)
    }
}
