//! Pending-task scheduling
//!
//! Holds the pending set and the pluggable policies that pick the next task
//! to dispatch: first-come, shortest-job-first and priority.

mod pending;
mod policy;

pub use pending::PendingSet;
pub use policy::{FirstCome, PolicyKind, PriorityFirst, ScheduleError, SchedulingPolicy, ShortestJobFirst};
