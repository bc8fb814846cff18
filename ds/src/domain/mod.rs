//! Domain types shared by the scheduler, the workers and the orchestrator

mod priority;
mod task;
mod unit;

pub use priority::Priority;
pub use task::{Task, TaskId};
pub use unit::{UnitConfig, UnitId, UnitState};
