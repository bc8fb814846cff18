//! The pending set: tasks that have arrived but are not yet dispatched

use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::domain::{Task, TaskId};

/// Ordered collection of pending tasks
///
/// Arrivals go to the back. A task the dispatcher could not place goes back to
/// the front so it is re-offered first on the next tick.
#[derive(Debug, Clone, Default)]
pub struct PendingSet {
    tasks: VecDeque<Task>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a newly arrived task
    pub fn push_back(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    /// Reinsert a deferred task ahead of everything else
    pub fn push_front(&mut self, task: Task) {
        self.tasks.push_front(task);
    }

    pub fn pop_front(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// Remove the task at `index`, shifting later tasks forward
    pub fn remove(&mut self, index: usize) -> Option<Task> {
        self.tasks.remove(index)
    }

    pub fn front(&self) -> Option<&Task> {
        self.tasks.front()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Identifiers in current order
    pub fn ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|t| t.id).collect()
    }

    /// Stable in-place reorder; equal tasks keep their relative order
    pub fn sort_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Task, &Task) -> Ordering,
    {
        self.tasks.make_contiguous().sort_by(compare);
    }
}

impl FromIterator<Task> for PendingSet {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        Self {
            tasks: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Priority;

    fn task(id: TaskId, cost: f64) -> Task {
        Task::new(id, cost, Priority::Medium)
    }

    #[test]
    fn test_push_front_goes_ahead_of_arrivals() {
        let mut pending = PendingSet::new();
        pending.push_back(task(1, 1.0));
        pending.push_back(task(2, 1.0));
        pending.push_front(task(3, 1.0));

        assert_eq!(pending.ids(), vec![3, 1, 2]);
        assert_eq!(pending.front().map(|t| t.id), Some(3));
    }

    #[test]
    fn test_remove_shifts_later_tasks() {
        let mut pending: PendingSet = [task(1, 1.0), task(2, 1.0), task(3, 1.0)].into_iter().collect();
        let removed = pending.remove(1).unwrap();
        assert_eq!(removed.id, 2);
        assert_eq!(pending.ids(), vec![1, 3]);
        assert!(pending.remove(5).is_none());
    }

    #[test]
    fn test_sort_is_stable() {
        let mut pending: PendingSet = [task(1, 2.0), task(2, 1.0), task(3, 2.0), task(4, 1.0)]
            .into_iter()
            .collect();
        pending.sort_by(|a, b| a.cost.total_cmp(&b.cost));
        assert_eq!(pending.ids(), vec![2, 4, 1, 3]);
    }
}
