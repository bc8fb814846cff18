//! Simulation configuration types and loading

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{Priority, Task, UnitConfig};
use crate::orchestrator::{OrchestratorConfig, WaitReference};
use crate::worker::{MetricsSource, WorkerConfig};

/// Main dispatchsim configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level when not given on the command line
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Policy, arrival process and timing
    pub simulation: SimulationConfig,

    /// Control loop settings
    pub orchestrator: OrchestratorConfig,

    /// Execution unit settings
    pub worker: WorkerConfig,

    /// Execution units, in balancer tie-break order
    pub units: Vec<UnitConfig>,

    /// The task pool
    pub tasks: Vec<Task>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this before starting a simulation so a bad file fails with a clear
    /// message instead of a stalled run.
    pub fn validate(&self) -> Result<()> {
        tracing::debug!("Config::validate: called");
        let sim = &self.simulation;

        if self.units.is_empty() {
            return Err(eyre::eyre!("At least one execution unit must be configured"));
        }

        let mut unit_ids = HashSet::new();
        for unit in &self.units {
            if !unit_ids.insert(unit.id) {
                return Err(eyre::eyre!("Duplicate unit id: {}", unit.id));
            }
            if !unit.capacity.is_finite() || unit.capacity <= 0.0 {
                return Err(eyre::eyre!(
                    "Unit {} has invalid capacity {}; capacity must be greater than zero",
                    unit.id,
                    unit.capacity
                ));
            }
        }

        let mut task_ids = HashSet::new();
        for task in &self.tasks {
            if !task_ids.insert(task.id) {
                return Err(eyre::eyre!("Duplicate task id: {}", task.id));
            }
            if !task.cost.is_finite() || task.cost <= 0.0 {
                return Err(eyre::eyre!(
                    "Task {} has invalid cost {}; cost must be greater than zero",
                    task.id,
                    task.cost
                ));
            }
        }

        if sim.max_load_per_unit == Some(0) {
            return Err(eyre::eyre!("max-load-per-unit must be at least 1"));
        }
        if !sim.time_scale.is_finite() || sim.time_scale <= 0.0 {
            return Err(eyre::eyre!("time-scale must be greater than zero"));
        }
        if self.orchestrator.tick_ms == 0 {
            return Err(eyre::eyre!("tick-ms must be greater than zero"));
        }

        for task in &self.tasks {
            for unit in &self.units {
                if task.try_duration_on(unit.capacity, sim.time_scale).is_none() {
                    return Err(eyre::eyre!(
                        "Task {} on unit {} runs for {}s, which is too long to simulate",
                        task.id,
                        unit.id,
                        task.cost / unit.capacity * sim.time_scale
                    ));
                }
            }
        }

        sim.policy
            .parse::<crate::scheduler::PolicyKind>()
            .map_err(|e| eyre::eyre!("{}", e))?;
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .dispatchsim.yml
        let local_config = PathBuf::from(".dispatchsim.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/dispatchsim/dispatchsim.yml
        if let Some(user_config) = Self::user_config_path() {
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialised
    ///
    /// Any failure yields `None`; the full load later reports it properly.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".dispatchsim.yml")];
                paths.extend(Self::user_config_path());
                paths
            }
        };

        Self::log_level_from(&candidates)
    }

    /// Log level of the first candidate that reads and parses, as `load` picks it
    fn log_level_from(candidates: &[PathBuf]) -> Option<String> {
        candidates
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| {
                let content = fs::read_to_string(p).ok()?;
                serde_yaml::from_str::<Self>(&content).ok()
            })?
            .log_level
    }

    /// Path of the per-user config file
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dispatchsim").join("dispatchsim.yml"))
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Write this configuration as YAML
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context(format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(path, content).context(format!("Failed to write config to {}", path.display()))?;
        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// A small runnable setup: two units and six tasks
    pub fn sample() -> Self {
        Self {
            log_level: Some("info".to_string()),
            simulation: SimulationConfig {
                policy: "shortest-job-first".to_string(),
                arrival_rate: Some(2.0),
                max_load_per_unit: Some(2),
                seed: Some(42),
                ..Default::default()
            },
            units: vec![UnitConfig::new(1, 1.0), UnitConfig::new(2, 2.0)],
            tasks: vec![
                Task::new(1, 2.0, Priority::Medium),
                Task::new(2, 1.0, Priority::High),
                Task::new(3, 3.0, Priority::Low),
                Task::new(4, 0.5, Priority::High),
                Task::new(5, 1.5, Priority::Medium),
                Task::new(6, 2.5, Priority::Low),
            ],
            ..Default::default()
        }
    }
}

/// Policy, arrival process and timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Scheduling policy name or alias
    pub policy: String,

    /// λ of the exponential inter-arrival distribution
    #[serde(rename = "arrival-rate", skip_serializing_if = "Option::is_none")]
    pub arrival_rate: Option<f64>,

    /// Optional cap on in-flight tasks per unit
    #[serde(rename = "max-load-per-unit", skip_serializing_if = "Option::is_none")]
    pub max_load_per_unit: Option<u32>,

    /// Seconds of wall time per cost unit
    #[serde(rename = "time-scale")]
    pub time_scale: f64,

    /// Seed for the shuffle and the arrival process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(rename = "wait-reference")]
    pub wait_reference: WaitReference,

    /// CPU figure carried by heartbeats
    pub metrics: MetricsSource,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            policy: "first-come".to_string(),
            arrival_rate: None,
            max_load_per_unit: None,
            time_scale: 1.0,
            seed: None,
            wait_reference: WaitReference::default(),
            metrics: MetricsSource::default(),
        }
    }
}
