//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dispatchsim - load-balanced task dispatch simulator
#[derive(Parser)]
#[command(
    name = "ds",
    about = "Discrete-time simulator of a load-balanced task dispatch layer",
    version,
    after_help = "Logs are written to: ~/.local/share/dispatchsim/logs/dispatchsim.log (use -v for stderr)"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, help = "Log level (trace, debug, info, warn, error)")]
    pub log_level: Option<String>,

    /// Log to stderr instead of the log file
    #[arg(short, long, global = true, help = "Log to stderr instead of the log file")]
    pub verbose: bool,

    /// Subcommand to execute; `run` when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run a simulation and print the report
    Run(RunArgs),

    /// Write a sample configuration file
    Init {
        /// Destination (defaults to ./.dispatchsim.yml)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },

    /// List the scheduling policies and their aliases
    Policies,
}

/// Overrides applied on top of the loaded configuration
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Scheduling policy (first-come, shortest-job-first, priority)
    #[arg(short, long)]
    pub policy: Option<String>,

    /// Mean arrivals per time unit; 0 for instantaneous arrivals
    #[arg(short = 'r', long)]
    pub arrival_rate: Option<f64>,

    /// Maximum in-flight tasks per unit
    #[arg(short, long)]
    pub max_load: Option<u32>,

    /// RNG seed for the shuffle and the arrival process
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Seconds of wall time per cost unit
    #[arg(short, long)]
    pub time_scale: Option<f64>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Output format for the simulation report
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["ds"]);
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_run_overrides() {
        let cli = Cli::parse_from([
            "ds",
            "run",
            "--policy",
            "sjf",
            "--arrival-rate",
            "0.5",
            "--max-load",
            "2",
            "--seed",
            "9",
            "--time-scale",
            "0.01",
            "--format",
            "json",
        ]);
        let Some(Command::Run(args)) = cli.command else {
            panic!("Expected Run command");
        };
        assert_eq!(args.policy.as_deref(), Some("sjf"));
        assert_eq!(args.arrival_rate, Some(0.5));
        assert_eq!(args.max_load, Some(2));
        assert_eq!(args.seed, Some(9));
        assert_eq!(args.time_scale, Some(0.01));
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn test_cli_parse_run_defaults() {
        let cli = Cli::parse_from(["ds", "run"]);
        let Some(Command::Run(args)) = cli.command else {
            panic!("Expected Run command");
        };
        assert!(args.policy.is_none());
        assert_eq!(args.format, OutputFormat::Text);
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["ds", "init", "sim.yml"]);
        assert!(matches!(cli.command, Some(Command::Init { path: Some(ref p) }) if p == &PathBuf::from("sim.yml")));
    }

    #[test]
    fn test_cli_parse_policies() {
        let cli = Cli::parse_from(["ds", "policies"]);
        assert!(matches!(cli.command, Some(Command::Policies)));
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["ds", "run", "-c", "/path/to/config.yml", "-l", "debug", "-v"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/config.yml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("table".parse::<OutputFormat>().is_err());
    }
}
