//! Execution unit task implementation

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::{Task, UnitConfig};

use super::config::WorkerConfig;
use super::messages::{UnitCommand, UnitEvent, UnitSummary};
use super::metrics::MetricsProvider;

/// A simulated execution unit
///
/// Consumes one task at a time from its own queue, waits `cost / capacity`
/// (scaled) and reports a completion. While idle it emits heartbeats. A stop
/// command ends the loop with an exit event.
pub struct ExecutionUnit {
    config: UnitConfig,
    heartbeat_interval: Duration,
    time_scale: f64,
    rx: mpsc::UnboundedReceiver<UnitCommand>,
    events: mpsc::Sender<UnitEvent>,
    metrics: Box<dyn MetricsProvider>,
    pid: u32,
    summary: UnitSummary,
}

impl ExecutionUnit {
    /// Create a unit reading from `rx` and reporting on `events`
    pub fn new(
        config: UnitConfig,
        worker: &WorkerConfig,
        time_scale: f64,
        rx: mpsc::UnboundedReceiver<UnitCommand>,
        events: mpsc::Sender<UnitEvent>,
        metrics: Box<dyn MetricsProvider>,
    ) -> Self {
        debug!(unit = config.id, capacity = config.capacity, "ExecutionUnit::new: called");
        let summary = UnitSummary {
            unit: config.id,
            ..Default::default()
        };
        Self {
            config,
            heartbeat_interval: worker.heartbeat_interval(),
            time_scale,
            rx,
            events,
            metrics,
            pid: std::process::id(),
            summary,
        }
    }

    /// Run the unit on its own tokio task
    pub fn spawn(self) -> JoinHandle<UnitSummary> {
        tokio::spawn(self.run())
    }

    /// Run until a stop command arrives or the queue closes
    pub async fn run(mut self) -> UnitSummary {
        let unit = self.config.id;
        info!(unit, capacity = self.config.capacity, "Execution unit started");

        let start = Instant::now();
        let mut heartbeat = tokio::time::interval_at(start + self.heartbeat_interval, self.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(UnitCommand::Run(task)) => {
                        if !self.execute(task).await {
                            break;
                        }
                    }
                    Some(UnitCommand::Stop) => {
                        debug!(unit, "ExecutionUnit::run: stop received");
                        break;
                    }
                    None => {
                        warn!(unit, "Unit queue closed without a stop command");
                        break;
                    }
                },
                _ = heartbeat.tick() => {
                    if !self.heartbeat().await {
                        break;
                    }
                }
            }
        }

        let exit = UnitEvent::Exit {
            unit,
            pid: self.pid,
            at: Instant::now(),
        };
        self.emit(exit).await;
        info!(unit, completed = self.summary.completed, "Execution unit stopped");
        self.summary
    }

    /// Simulate one task; false if the orchestrator is gone
    async fn execute(&mut self, task: Task) -> bool {
        let unit = self.config.id;
        let simulated = task.duration_on(self.config.capacity, self.time_scale);
        debug!(unit, task_id = task.id, ?simulated, "ExecutionUnit::execute: called");

        let started = Instant::now();
        tokio::time::sleep(simulated).await;
        let at = Instant::now();
        let duration = at - started;

        self.summary.completed += 1;
        self.summary.busy += duration;

        self.emit(UnitEvent::Completion {
            unit,
            task_id: task.id,
            duration,
            at,
        })
        .await
    }

    async fn heartbeat(&mut self) -> bool {
        let cpu_percent = self.metrics.cpu_percent();
        debug!(unit = self.config.id, cpu_percent, "ExecutionUnit::heartbeat: called");
        self.emit(UnitEvent::Heartbeat {
            unit: self.config.id,
            pid: self.pid,
            cpu_percent,
            at: Instant::now(),
        })
        .await
    }

    async fn emit(&mut self, event: UnitEvent) -> bool {
        if self.events.send(event).await.is_err() {
            warn!(unit = self.config.id, "Event channel closed, dropping event");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Priority;
    use crate::worker::metrics::NoopMetrics;

    struct FixedCpu(f32);

    impl MetricsProvider for FixedCpu {
        fn cpu_percent(&mut self) -> f32 {
            self.0
        }
    }

    fn spawn_unit(
        capacity: f64,
        heartbeat_ms: u64,
        metrics: Box<dyn MetricsProvider>,
    ) -> (
        mpsc::UnboundedSender<UnitCommand>,
        mpsc::Receiver<UnitEvent>,
        JoinHandle<UnitSummary>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(64);
        let worker = WorkerConfig {
            heartbeat_interval_ms: heartbeat_ms,
        };
        let unit = ExecutionUnit::new(UnitConfig::new(1, capacity), &worker, 1.0, rx, event_tx, metrics);
        (tx, event_rx, unit.spawn())
    }

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_run_future_is_send() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let (event_tx, _event_rx) = mpsc::channel(1);
        let unit = ExecutionUnit::new(
            UnitConfig::new(1, 1.0),
            &WorkerConfig::default(),
            1.0,
            rx,
            event_tx,
            Box::new(NoopMetrics),
        );
        let run = unit.run();
        assert_send(&run);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_duration_matches_cost_over_capacity() {
        let (tx, mut events, handle) = spawn_unit(2.0, 60_000, Box::new(NoopMetrics));

        tx.send(UnitCommand::Run(Task::new(7, 3.0, Priority::High))).unwrap();

        match events.recv().await.unwrap() {
            UnitEvent::Completion {
                unit, task_id, duration, ..
            } => {
                assert_eq!(unit, 1);
                assert_eq!(task_id, 7);
                let expected = Duration::from_millis(1500);
                assert!(duration >= expected);
                assert!(duration - expected < Duration::from_millis(50));
            }
            other => panic!("Wrong event: {:?}", other),
        }

        tx.send(UnitCommand::Stop).unwrap();
        assert!(matches!(events.recv().await.unwrap(), UnitEvent::Exit { unit: 1, .. }));

        let summary = handle.await.unwrap();
        assert_eq!(summary.completed, 1);
        assert!(summary.busy >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tasks_run_serially() {
        let (tx, mut events, handle) = spawn_unit(1.0, 60_000, Box::new(NoopMetrics));
        let start = Instant::now();

        tx.send(UnitCommand::Run(Task::new(1, 1.0, Priority::Medium))).unwrap();
        tx.send(UnitCommand::Run(Task::new(2, 1.0, Priority::Medium))).unwrap();

        let first = events.recv().await.unwrap();
        let second = events.recv().await.unwrap();
        assert!(matches!(first, UnitEvent::Completion { task_id: 1, .. }));
        assert!(matches!(second, UnitEvent::Completion { task_id: 2, .. }));
        assert!(second.at() - start >= Duration::from_secs(2));

        tx.send(UnitCommand::Stop).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_unit_emits_heartbeats() {
        let (tx, mut events, handle) = spawn_unit(1.0, 1000, Box::new(FixedCpu(12.5)));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        tx.send(UnitCommand::Stop).unwrap();

        let mut heartbeats = 0;
        let mut exited = false;
        while let Some(event) = events.recv().await {
            match event {
                UnitEvent::Heartbeat { cpu_percent, pid, .. } => {
                    assert_eq!(cpu_percent, 12.5);
                    assert_eq!(pid, std::process::id());
                    heartbeats += 1;
                }
                UnitEvent::Exit { .. } => exited = true,
                UnitEvent::Completion { .. } => panic!("No task was sent"),
            }
        }

        assert_eq!(heartbeats, 2);
        assert!(exited);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_queue_still_exits() {
        let (tx, mut events, handle) = spawn_unit(1.0, 60_000, Box::new(NoopMetrics));
        drop(tx);

        assert!(matches!(events.recv().await.unwrap(), UnitEvent::Exit { .. }));
        let summary = handle.await.unwrap();
        assert_eq!(summary.completed, 0);
    }
}
