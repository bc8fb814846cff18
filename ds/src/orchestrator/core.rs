//! Main Orchestrator implementation

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::domain::{TaskId, UnitConfig, UnitId, UnitState};
use crate::error::SimError;
use crate::scheduler::{PendingSet, PolicyKind, ScheduleError, SchedulingPolicy};
use crate::worker::{ExecutionUnit, MetricsFactory, UnitCommand, UnitEvent, UnitSummary, WorkerConfig};

use super::arrival::ArrivalGenerator;
use super::balancer::LoadBalancer;
use super::config::OrchestratorConfig;
use super::stats::{SimulationReport, StatsCollector, WaitReference};

/// Drives arrivals, policy selection, placement and event accounting
///
/// Owns every execution unit for the duration of [`Orchestrator::run`].
pub struct Orchestrator {
    policy: PolicyKind,
    arrivals: ArrivalGenerator,
    balancer: LoadBalancer,
    units: Vec<UnitConfig>,
    config: OrchestratorConfig,
    worker: WorkerConfig,
    time_scale: f64,
    wait_reference: WaitReference,
    metrics: MetricsFactory,
}

impl Orchestrator {
    /// Build an orchestrator from a loaded configuration
    ///
    /// Fails before any simulation work if the policy name is unknown or no
    /// execution unit is configured.
    pub fn new(config: &Config) -> Result<Self, SimError> {
        debug!(
            policy = %config.simulation.policy,
            units = config.units.len(),
            tasks = config.tasks.len(),
            "Orchestrator::new: called"
        );
        let policy: PolicyKind = config.simulation.policy.parse()?;

        if config.units.is_empty() {
            return Err(SimError::InvalidConfig("at least one execution unit is required".to_string()));
        }

        let sim = &config.simulation;
        Ok(Self {
            policy,
            arrivals: ArrivalGenerator::new(config.tasks.clone(), sim.arrival_rate, sim.time_scale, sim.seed),
            balancer: LoadBalancer::new(sim.max_load_per_unit),
            units: config.units.clone(),
            config: config.orchestrator.clone(),
            worker: config.worker.clone(),
            time_scale: sim.time_scale,
            wait_reference: sim.wait_reference,
            metrics: sim.metrics.factory(),
        })
    }

    /// Replace the heartbeat metrics source
    pub fn with_metrics(mut self, metrics: MetricsFactory) -> Self {
        debug!("Orchestrator::with_metrics: called");
        self.metrics = metrics;
        self
    }

    pub fn policy(&self) -> PolicyKind {
        self.policy
    }

    /// Run the simulation until every task has completed
    ///
    /// This consumes the Orchestrator, spawns one task per execution unit,
    /// and returns the final report after all units have exited.
    pub async fn run(self) -> Result<SimulationReport, SimError> {
        let run_id = Uuid::now_v7();
        let started_at = Utc::now();
        let origin = Instant::now();
        info!(
            %run_id,
            policy = %self.policy,
            units = self.units.len(),
            tasks = self.arrivals.remaining(),
            max_load = ?self.balancer.max_load(),
            "Simulation started"
        );

        let (event_tx, mut event_rx) = mpsc::channel(self.config.event_buffer.max(1));
        let mut queues = Vec::with_capacity(self.units.len());
        let mut joins: Vec<(UnitId, JoinHandle<UnitSummary>)> = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            let (tx, rx) = mpsc::unbounded_channel();
            let execution_unit = ExecutionUnit::new(
                unit.clone(),
                &self.worker,
                self.time_scale,
                rx,
                event_tx.clone(),
                (self.metrics)(),
            );
            queues.push(tx);
            joins.push((unit.id, execution_unit.spawn()));
        }
        // Units hold the only senders, so the channel closes once they all exit
        drop(event_tx);

        let stats = StatsCollector::new(origin, self.wait_reference, self.units.iter().map(|u| u.id));
        let mut sim = Simulation::new(
            self.policy.build(),
            self.arrivals,
            self.balancer,
            self.units.iter().map(|u| UnitState::new(u.id)).collect(),
            queues,
            stats,
        );

        let tick = self.config.tick();
        let mut ticker = tokio::time::interval_at(origin + tick, tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = origin;

        while !sim.is_drained() {
            let now = Instant::now();
            let elapsed = now - last_tick;
            last_tick = now;

            sim.admit_arrival(elapsed, now);
            sim.dispatch(now)?;
            sim.drain_events(&mut event_rx);
            sim.record_loads(now);

            sim.wait_for_tick(&mut ticker, &mut event_rx).await;
        }

        info!(%run_id, completed = sim.stats.completed(), "All work drained, stopping units");
        sim.stop_units();

        while let Some(event) = event_rx.recv().await {
            sim.apply_event(event);
        }

        let mut summaries = Vec::with_capacity(joins.len());
        for (unit, join) in joins {
            let summary = join.await.map_err(|e| SimError::UnitJoin {
                unit,
                reason: e.to_string(),
            })?;
            summaries.push(summary);
        }

        let elapsed = origin.elapsed();
        let Simulation { loads, stats, .. } = sim;
        let report = stats.finish(run_id, started_at, &self.policy.to_string(), elapsed, loads, &summaries);

        info!(
            %run_id,
            elapsed_secs = report.total_elapsed_secs,
            completed = report.completed(),
            throughput = report.throughput,
            "Simulation finished"
        );
        Ok(report)
    }
}

/// Mutable state of one run, driven tick by tick from the control loop
///
/// `loads[i]` and `queues[i]` describe the same unit. Loads are written only
/// here: incremented on dispatch, decremented when a completion is applied.
struct Simulation {
    policy: Box<dyn SchedulingPolicy>,
    arrivals: ArrivalGenerator,
    balancer: LoadBalancer,
    pending: PendingSet,
    loads: Vec<UnitState>,
    queues: Vec<mpsc::UnboundedSender<UnitCommand>>,
    stats: StatsCollector,
}

impl Simulation {
    fn new(
        policy: Box<dyn SchedulingPolicy>,
        arrivals: ArrivalGenerator,
        balancer: LoadBalancer,
        loads: Vec<UnitState>,
        queues: Vec<mpsc::UnboundedSender<UnitCommand>>,
        stats: StatsCollector,
    ) -> Self {
        Self {
            policy,
            arrivals,
            balancer,
            pending: PendingSet::new(),
            loads,
            queues,
            stats,
        }
    }

    /// No task left to arrive, none pending, none in flight
    fn is_drained(&self) -> bool {
        self.arrivals.is_exhausted() && self.pending.is_empty() && self.loads.iter().all(UnitState::is_idle)
    }

    fn admit_arrival(&mut self, elapsed: Duration, now: Instant) {
        if let Some(task) = self.arrivals.advance(elapsed) {
            info!(
                task_id = task.id,
                cost = task.cost,
                priority = %task.priority,
                remaining = self.arrivals.remaining(),
                "Task arrived"
            );
            self.stats.record_arrival(task.id, now);
            self.pending.push_back(task);
        }
    }

    /// At most one dispatch attempt
    ///
    /// Returns the placement made, if any. A task that finds every unit at
    /// its cap goes back to the front of the pending set.
    fn dispatch(&mut self, now: Instant) -> Result<Option<(TaskId, UnitId)>, SimError> {
        if self.pending.is_empty() {
            return Ok(None);
        }

        let task = match self.policy.select(&mut self.pending) {
            Ok(task) => task,
            Err(ScheduleError::EmptyPending) => {
                debug!("Simulation::dispatch: nothing to dispatch");
                return Ok(None);
            }
        };

        let Some(index) = self.balancer.choose(&self.loads) else {
            debug!(task_id = task.id, pending = self.pending.len() + 1, "All units at capacity, deferring task");
            self.pending.push_front(task);
            self.stats.record_deferral();
            return Ok(None);
        };

        let unit = self.loads[index].id;
        let task_id = task.id;
        let priority = task.priority;
        self.queues[index]
            .send(UnitCommand::Run(task))
            .map_err(|_| SimError::UnitQueueClosed { unit })?;
        self.loads[index].assign();
        self.stats.record_dispatch(task_id, unit, now);

        info!(task_id, unit, %priority, load = self.loads[index].load, "Task dispatched");
        Ok(Some((task_id, unit)))
    }

    fn apply_event(&mut self, event: UnitEvent) {
        match event {
            UnitEvent::Completion {
                unit,
                task_id,
                duration,
                at,
            } => {
                match self.loads.iter_mut().find(|s| s.id == unit) {
                    Some(state) => {
                        if !state.release() {
                            warn!(unit, task_id, "Completion on a unit with no recorded load");
                        }
                    }
                    None => warn!(unit, task_id, "Completion from unknown unit"),
                }
                let wait_secs = self.stats.record_completion(task_id, unit, duration, at);
                info!(
                    unit,
                    task_id,
                    duration_secs = duration.as_secs_f64(),
                    wait_secs,
                    "Task completed"
                );
            }
            UnitEvent::Heartbeat {
                unit,
                pid,
                cpu_percent,
                at,
            } => {
                debug!(unit, pid, cpu_percent, "Heartbeat received");
                self.stats.record_heartbeat(unit, pid, cpu_percent, at);
            }
            UnitEvent::Exit { unit, pid, at } => {
                info!(unit, pid, "Execution unit exited");
                self.stats.record_exit(unit, pid, at);
            }
        }
    }

    /// Apply every event already delivered, without waiting
    fn drain_events(&mut self, events: &mut mpsc::Receiver<UnitEvent>) {
        while let Ok(event) = events.try_recv() {
            self.apply_event(event);
        }
    }

    fn record_loads(&mut self, now: Instant) {
        self.stats.record_loads(now, &self.loads);
    }

    /// Sleep until the next tick, applying events as they arrive
    async fn wait_for_tick(&mut self, ticker: &mut Interval, events: &mut mpsc::Receiver<UnitEvent>) {
        loop {
            tokio::select! {
                _ = ticker.tick() => return,
                Some(event) = events.recv() => self.apply_event(event),
            }
        }
    }

    /// Send the stop command to every unit
    fn stop_units(&mut self) {
        for (state, queue) in self.loads.iter().zip(&self.queues) {
            if queue.send(UnitCommand::Stop).is_err() {
                warn!(unit = state.id, "Unit queue already closed at shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Priority, Task};

    struct Harness {
        sim: Simulation,
        inboxes: Vec<mpsc::UnboundedReceiver<UnitCommand>>,
        origin: Instant,
    }

    fn harness(policy: PolicyKind, max_load: Option<u32>, unit_count: u32) -> Harness {
        let origin = Instant::now();
        let mut queues = Vec::new();
        let mut inboxes = Vec::new();
        for _ in 0..unit_count {
            let (tx, rx) = mpsc::unbounded_channel();
            queues.push(tx);
            inboxes.push(rx);
        }
        let ids: Vec<UnitId> = (1..=unit_count).collect();
        let sim = Simulation::new(
            policy.build(),
            ArrivalGenerator::new(Vec::new(), None, 1.0, Some(1)),
            LoadBalancer::new(max_load),
            ids.iter().map(|&id| UnitState::new(id)).collect(),
            queues,
            StatsCollector::new(origin, WaitReference::default(), ids),
        );
        Harness { sim, inboxes, origin }
    }

    fn received(inbox: &mut mpsc::UnboundedReceiver<UnitCommand>) -> Vec<TaskId> {
        let mut ids = Vec::new();
        while let Ok(UnitCommand::Run(task)) = inbox.try_recv() {
            ids.push(task.id);
        }
        ids
    }

    fn completion(unit: UnitId, task_id: TaskId, at: Instant) -> UnitEvent {
        UnitEvent::Completion {
            unit,
            task_id,
            duration: Duration::from_millis(10),
            at,
        }
    }

    #[test]
    fn test_sjf_dispatch_order_when_all_pending() {
        let mut h = harness(PolicyKind::ShortestJobFirst, None, 2);
        h.sim.pending.push_back(Task::new(1, 2.0, Priority::Medium));
        h.sim.pending.push_back(Task::new(2, 1.0, Priority::High));
        h.sim.pending.push_back(Task::new(3, 3.0, Priority::Low));

        let mut order = Vec::new();
        for _ in 0..3 {
            let (task_id, _) = h.sim.dispatch(h.origin).unwrap().unwrap();
            order.push(task_id);
        }

        assert_eq!(order, vec![2, 1, 3]);
        assert_eq!(received(&mut h.inboxes[0]), vec![2, 3]);
        assert_eq!(received(&mut h.inboxes[1]), vec![1]);
        assert_eq!(h.sim.loads[0].load, 2);
        assert_eq!(h.sim.loads[1].load, 1);
    }

    #[test]
    fn test_priority_dispatches_highest_class_first() {
        let mut h = harness(PolicyKind::Priority, None, 1);
        h.sim.pending.push_back(Task::new(1, 1.0, Priority::Medium));
        h.sim.pending.push_back(Task::new(2, 1.0, Priority::High));
        h.sim.pending.push_back(Task::new(3, 1.0, Priority::Low));

        assert_eq!(h.sim.dispatch(h.origin).unwrap(), Some((2, 1)));
    }

    #[test]
    fn test_cap_defers_to_front_until_unit_frees() {
        let mut h = harness(PolicyKind::FirstCome, Some(1), 2);
        for id in 1..=3 {
            h.sim.pending.push_back(Task::new(id, 1.0, Priority::Medium));
        }

        assert_eq!(h.sim.dispatch(h.origin).unwrap(), Some((1, 1)));
        assert_eq!(h.sim.dispatch(h.origin).unwrap(), Some((2, 2)));
        assert_eq!(h.sim.dispatch(h.origin).unwrap(), None);
        assert_eq!(h.sim.pending.ids(), vec![3]);
        assert!(h.sim.loads.iter().all(|s| s.load <= 1));

        // A later arrival must not jump ahead of the deferred task
        h.sim.pending.push_back(Task::new(4, 1.0, Priority::High));
        assert_eq!(h.sim.dispatch(h.origin).unwrap(), None);
        assert_eq!(h.sim.pending.ids(), vec![3, 4]);
        assert_eq!(h.sim.stats.completed(), 0);

        h.sim.apply_event(completion(2, 2, h.origin));
        assert_eq!(h.sim.dispatch(h.origin).unwrap(), Some((3, 2)));
        assert!(h.sim.loads.iter().all(|s| s.load <= 1));
    }

    #[test]
    fn test_deferred_task_returns_to_front() {
        let mut h = harness(PolicyKind::ShortestJobFirst, Some(1), 1);
        h.sim.pending.push_back(Task::new(1, 5.0, Priority::Medium));
        assert_eq!(h.sim.dispatch(h.origin).unwrap(), Some((1, 1)));

        h.sim.pending.push_back(Task::new(2, 4.0, Priority::Medium));
        assert_eq!(h.sim.dispatch(h.origin).unwrap(), None);
        assert_eq!(h.sim.pending.ids(), vec![2]);

        h.sim.pending.push_back(Task::new(3, 1.0, Priority::Medium));
        assert_eq!(h.sim.pending.front().map(|t| t.id), Some(2));
    }

    #[test]
    fn test_empty_pending_is_noop() {
        let mut h = harness(PolicyKind::Priority, None, 1);
        assert_eq!(h.sim.dispatch(h.origin).unwrap(), None);
        assert!(h.sim.loads[0].is_idle());
    }

    #[test]
    fn test_completion_releases_load_and_drains() {
        let mut h = harness(PolicyKind::FirstCome, None, 1);
        h.sim.pending.push_back(Task::new(9, 1.0, Priority::Medium));
        h.sim.dispatch(h.origin).unwrap();
        assert!(!h.sim.is_drained());

        h.sim.apply_event(completion(1, 9, h.origin + Duration::from_millis(10)));
        assert!(h.sim.loads[0].is_idle());
        assert!(h.sim.is_drained());
        assert_eq!(h.sim.stats.completed(), 1);
    }

    #[test]
    fn test_unmatched_completion_keeps_load_at_zero() {
        let mut h = harness(PolicyKind::FirstCome, None, 1);
        h.sim.apply_event(completion(1, 1, h.origin));
        h.sim.apply_event(completion(99, 2, h.origin));
        assert_eq!(h.sim.loads[0].load, 0);
    }

    #[test]
    fn test_closed_unit_queue_is_an_error() {
        let mut h = harness(PolicyKind::FirstCome, None, 1);
        h.inboxes.clear();
        h.sim.pending.push_back(Task::new(1, 1.0, Priority::Medium));
        let err = h.sim.dispatch(h.origin).unwrap_err();
        assert!(matches!(err, SimError::UnitQueueClosed { unit: 1 }));
    }

    #[test]
    fn test_arrivals_feed_pending_one_per_tick() {
        let mut h = harness(PolicyKind::FirstCome, None, 1);
        let tasks = (1..=3).map(|id| Task::new(id, 1.0, Priority::Medium)).collect();
        h.sim.arrivals = ArrivalGenerator::new(tasks, None, 1.0, Some(9));

        h.sim.admit_arrival(Duration::from_secs(10), h.origin);
        assert_eq!(h.sim.pending.len(), 1);
        h.sim.admit_arrival(Duration::ZERO, h.origin);
        assert_eq!(h.sim.pending.len(), 2);
        assert_eq!(h.sim.arrivals.remaining(), 1);
    }

    #[test]
    fn test_stop_units_sends_stop_to_every_queue() {
        let mut h = harness(PolicyKind::FirstCome, None, 3);
        h.sim.stop_units();
        for inbox in &mut h.inboxes {
            assert!(matches!(inbox.try_recv(), Ok(UnitCommand::Stop)));
        }
    }

    #[test]
    fn test_unknown_policy_fails_construction() {
        let mut config = Config::sample();
        config.simulation.policy = "lottery".to_string();
        let err = Orchestrator::new(&config).err().unwrap();
        assert!(matches!(err, SimError::UnknownPolicy { .. }));
    }

    #[test]
    fn test_no_units_fails_construction() {
        let mut config = Config::sample();
        config.units.clear();
        assert!(matches!(Orchestrator::new(&config), Err(SimError::InvalidConfig(_))));
    }
}
