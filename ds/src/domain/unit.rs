//! Execution unit configuration and load accounting

use serde::{Deserialize, Serialize};

/// Execution unit identifier
pub type UnitId = u32;

/// Static description of an execution unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitConfig {
    pub id: UnitId,

    /// Multiplier applied to task cost; simulated duration = cost / capacity
    pub capacity: f64,
}

impl UnitConfig {
    pub fn new(id: UnitId, capacity: f64) -> Self {
        Self { id, capacity }
    }
}

/// Number of in-flight tasks assigned to a unit
///
/// Only the orchestrator mutates this. Units report completions as events and
/// the orchestrator applies the effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    pub id: UnitId,
    pub load: u32,
}

impl UnitState {
    pub fn new(id: UnitId) -> Self {
        Self { id, load: 0 }
    }

    /// Record a dispatch to this unit
    pub fn assign(&mut self) {
        self.load += 1;
    }

    /// Record a completion on this unit
    ///
    /// Returns false if the unit had no load to release; the load stays at zero.
    pub fn release(&mut self) -> bool {
        match self.load.checked_sub(1) {
            Some(load) => {
                self.load = load;
                true
            }
            None => false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.load == 0
    }
}
