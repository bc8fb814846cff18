//! Stochastic arrival process
//!
//! Tasks are drawn from a pre-shuffled pool. Inter-arrival gaps follow an
//! exponential distribution with rate λ; without a positive λ every tick is
//! an arrival slot.

use std::collections::VecDeque;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Exp};
use tracing::debug;

use crate::domain::Task;

/// Countdown-driven generator feeding the pending set
pub struct ArrivalGenerator {
    pool: VecDeque<Task>,
    interarrival: Option<Exp<f64>>,
    /// Seconds until the next arrival slot opens
    countdown: f64,
    time_scale: f64,
    rng: StdRng,
}

impl ArrivalGenerator {
    /// Shuffle `tasks` into an arrival pool
    ///
    /// `rate` is λ in arrivals per time unit; absent, non-positive or
    /// non-finite rates give instantaneous arrivals.
    pub fn new(tasks: Vec<Task>, rate: Option<f64>, time_scale: f64, seed: Option<u64>) -> Self {
        debug!(tasks = tasks.len(), ?rate, time_scale, ?seed, "ArrivalGenerator::new: called");
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut tasks = tasks;
        tasks.shuffle(&mut rng);

        let interarrival = rate
            .filter(|r| r.is_finite() && *r > 0.0)
            .and_then(|r| Exp::new(r).ok());

        let mut generator = Self {
            pool: tasks.into(),
            interarrival,
            countdown: 0.0,
            time_scale,
            rng,
        };
        generator.countdown = generator.sample_gap();
        generator
    }

    fn sample_gap(&mut self) -> f64 {
        match &self.interarrival {
            Some(exp) => exp.sample(&mut self.rng) * self.time_scale,
            None => 0.0,
        }
    }

    /// Advance the countdown by `elapsed` and admit at most one task
    ///
    /// However far the countdown overshoots, only one task arrives per call.
    pub fn advance(&mut self, elapsed: Duration) -> Option<Task> {
        if self.pool.is_empty() {
            return None;
        }
        self.countdown -= elapsed.as_secs_f64();
        if self.countdown > 0.0 {
            return None;
        }
        let task = self.pool.pop_front()?;
        self.countdown = self.sample_gap();
        debug!(task_id = task.id, next_gap = self.countdown, "ArrivalGenerator::advance: admitted");
        Some(task)
    }

    /// Tasks still waiting to arrive
    pub fn remaining(&self) -> usize {
        self.pool.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn is_instantaneous(&self) -> bool {
        self.interarrival.is_none()
    }

    /// Time left before the next arrival slot opens
    pub fn time_to_next(&self) -> Duration {
        Duration::try_from_secs_f64(self.countdown.max(0.0)).unwrap_or(Duration::ZERO)
    }

    /// Arrival order of the remaining pool
    pub fn upcoming(&self) -> impl Iterator<Item = &Task> {
        self.pool.iter()
    }
}
