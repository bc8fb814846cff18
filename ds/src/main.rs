//! dispatchsim - load-balanced task dispatch simulator
//!
//! CLI entry point: loads configuration, runs a simulation and prints the report.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dispatchsim::cli::{Cli, Command, OutputFormat, RunArgs};
use dispatchsim::config::Config;
use dispatchsim::orchestrator::{Orchestrator, SimulationReport};
use dispatchsim::scheduler::PolicyKind;

fn setup_logging(level: &str, verbose: bool) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    // Verbose runs stream the log to stderr; otherwise it goes to a file so the report stays clean
    if verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        let log_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dispatchsim")
            .join("logs");

        fs::create_dir_all(&log_dir).context("Failed to create log directory")?;
        let log_file = fs::File::create(log_dir.join("dispatchsim.log")).context("Failed to create log file")?;

        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_ansi(false)
            .with_env_filter(filter)
            .init();
    }

    info!("Logging initialized (level: {}, verbose: {})", level, verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // CLI flag > config file > info
    let level = cli
        .log_level
        .clone()
        .or_else(|| Config::load_log_level(cli.config.as_ref()))
        .unwrap_or_else(|| "info".to_string());
    setup_logging(&level, cli.verbose).context("Failed to setup logging")?;

    match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => cmd_run(cli.config.as_ref(), args).await,
        Command::Init { path } => cmd_init(path),
        Command::Policies => cmd_policies(),
    }
}

/// Run one simulation and print its report
async fn cmd_run(config_path: Option<&PathBuf>, args: RunArgs) -> Result<()> {
    let mut config = Config::load(config_path).context("Failed to load configuration")?;
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration (run `ds init` to write a sample)")?;

    info!(
        policy = %config.simulation.policy,
        units = config.units.len(),
        tasks = config.tasks.len(),
        "dispatchsim loaded config"
    );

    let orchestrator = Orchestrator::new(&config)?;
    let report = orchestrator.run().await?;

    match args.format {
        OutputFormat::Text => print_report(&report),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{}", json);
        }
    }
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &RunArgs) {
    let sim = &mut config.simulation;
    if let Some(policy) = &args.policy {
        sim.policy = policy.clone();
    }
    if let Some(rate) = args.arrival_rate {
        sim.arrival_rate = Some(rate);
    }
    if let Some(max_load) = args.max_load {
        sim.max_load_per_unit = Some(max_load);
    }
    if let Some(seed) = args.seed {
        sim.seed = Some(seed);
    }
    if let Some(time_scale) = args.time_scale {
        sim.time_scale = time_scale;
    }
}

/// Write the sample configuration, never overwriting an existing file
fn cmd_init(path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(|| PathBuf::from(".dispatchsim.yml"));
    if path.exists() {
        return Err(eyre::eyre!("{} already exists, refusing to overwrite", path.display()));
    }
    Config::sample().save(&path)?;
    println!("Wrote sample config to {}", path.display());
    Ok(())
}

fn cmd_policies() -> Result<()> {
    println!("{}", "Scheduling policies:".bold());
    for kind in PolicyKind::all() {
        let aliases = kind.aliases();
        if aliases.is_empty() {
            println!("  {}", kind.to_string().cyan());
        } else {
            println!("  {:<20} (aliases: {})", kind.to_string().cyan(), aliases.join(", "));
        }
    }
    Ok(())
}

fn print_report(report: &SimulationReport) {
    println!("{}", "Simulation Results".bold().underline());
    println!("  Run:                 {}", report.run_id);
    println!("  Policy:              {}", report.policy.cyan());
    println!("  Total elapsed time:  {:.2}s", report.total_elapsed_secs);
    println!("  Completed tasks:     {}", report.completed());
    println!("  Mean response time:  {:.3}s", report.mean_response_secs);
    println!("  Throughput:          {:.3} tasks/s", report.throughput);
    println!("  Max wait time:       {:.3}s", report.max_wait_secs);
    println!("  Mean wait time:      {:.3}s", report.mean_wait_secs);
    println!("  Total wait time:     {:.3}s", report.total_wait_secs);
    println!("  Deferrals:           {}", report.deferrals);
    println!("  Heartbeats:          {}", report.heartbeats.len());

    println!();
    println!("{}", "Units".bold());
    for state in &report.final_loads {
        let usage = report.units.iter().find(|u| u.unit == state.id);
        let load = if state.is_idle() {
            state.load.to_string().green()
        } else {
            state.load.to_string().red()
        };
        match usage {
            Some(usage) => println!(
                "  unit {:<4} final load {}  peak {}  completed {}  utilization {:.1}%",
                state.id,
                load,
                report.peak_load(state.id),
                usage.completed,
                usage.utilization * 100.0
            ),
            None => println!("  unit {:<4} final load {}", state.id, load),
        }
    }

    println!();
    println!("{}", "Response times".bold());
    for completion in &report.completions {
        println!(
            "  task {:<4} unit {:<4} {:.3}s (wait {:.3}s)",
            completion.task_id, completion.unit, completion.duration_secs, completion.wait_secs
        );
    }
}
