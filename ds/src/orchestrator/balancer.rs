//! Load-aware placement

use tracing::debug;

use crate::domain::UnitState;

/// Picks the unit that receives the next dispatched task
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadBalancer {
    max_load: Option<u32>,
}

impl LoadBalancer {
    /// `max_load` caps in-flight tasks per unit; `None` means unbounded
    pub fn new(max_load: Option<u32>) -> Self {
        Self { max_load }
    }

    pub fn max_load(&self) -> Option<u32> {
        self.max_load
    }

    /// Index of the least-loaded unit below the cap
    ///
    /// Units are ranked by ascending load; equal loads keep configuration
    /// order. Returns `None` when every unit is at the cap.
    pub fn choose(&self, units: &[UnitState]) -> Option<usize> {
        let mut ranked: Vec<usize> = (0..units.len()).collect();
        ranked.sort_by_key(|&i| units[i].load);

        let chosen = ranked
            .into_iter()
            .find(|&i| self.max_load.is_none_or(|cap| units[i].load < cap));
        debug!(?chosen, max_load = ?self.max_load, "LoadBalancer::choose: called");
        chosen
    }
}
