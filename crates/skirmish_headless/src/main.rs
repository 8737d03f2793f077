//! Headless skirmish runner.
//!
//! Runs scenarios without graphics. Designed for CI determinism checks and
//! quick tuning passes on the agent templates.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in skirmish
//! cargo run -p skirmish_headless -- run --ticks 1200
//!
//! # Run a scenario file, print the report as JSON and keep a copy
//! cargo run -p skirmish_headless -- run --scenario duel.ron --json --output out/duel.json
//!
//! # Verify determinism across parallel runs
//! cargo run -p skirmish_headless -- verify --scenario duel.ron --runs 8
//! ```
//!
//! Reports go to stdout; logs go to stderr. `RUST_LOG` overrides the
//! default log level.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skirmish_headless::{run_scenario, verify_scenario, RunReport, Scenario, ScenarioError};

#[derive(Parser)]
#[command(name = "skirmish_headless")]
#[command(about = "Headless skirmish runner for CI and tuning")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print a report
    Run {
        /// Scenario file to load (built-in skirmish if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of ticks to simulate
        #[arg(short, long, default_value = "1200")]
        ticks: u64,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Also save the JSON report to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify determinism by running the same scenario several times
    Verify {
        /// Scenario file to load (built-in skirmish if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of ticks per run
        #[arg(short, long, default_value = "1200")]
        ticks: u64,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // stdout carries reports; logs go to stderr
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let outcome = match cli.command {
        Commands::Run {
            scenario,
            ticks,
            json,
            output,
        } => cmd_run(scenario.as_deref(), ticks, json, output.as_deref()),
        Commands::Verify {
            scenario,
            ticks,
            runs,
        } => cmd_verify(scenario.as_deref(), ticks, runs),
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "Headless run failed");
            eprintln!("FATAL: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_scenario(path: Option<&Path>) -> Result<Scenario, ScenarioError> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading scenario");
            Scenario::load(path)
        }
        None => Scenario::skirmish(),
    }
}

/// Run a single scenario
fn cmd_run(
    path: Option<&Path>,
    ticks: u64,
    json: bool,
    output: Option<&Path>,
) -> Result<ExitCode, ScenarioError> {
    let scenario = load_scenario(path)?;
    tracing::info!(scenario = %scenario.name, ticks, "Starting run");

    let report = run_scenario(&scenario, ticks)?;

    if let Some(output) = output {
        report.save(output)?;
        tracing::info!(path = %output.display(), "Report saved");
    }

    if json {
        let json = serde_json::to_string_pretty(&report).map_err(std::io::Error::other)?;
        println!("{json}");
    } else {
        print_report(&report);
    }
    Ok(ExitCode::SUCCESS)
}

fn print_report(report: &RunReport) {
    println!("Scenario:  {}", report.scenario);
    println!("Ticks:     {}", report.ticks);
    println!("Hash:      {:016x}", report.state_hash);
    println!("Damage:    {}", report.damage_dealt);
    println!("Retired:   {}", report.retired);
    println!("Events:    {}", report.events);
    if report.rejected_inputs > 0 {
        println!("Rejected:  {}", report.rejected_inputs);
    }
    for (faction, count) in &report.survivors {
        println!("Survivors: {faction:?} {count}");
    }
    for (faction, balances) in &report.stockpiles {
        let listing: Vec<String> = balances
            .iter()
            .map(|(kind, amount)| format!("{kind:?} {amount}"))
            .collect();
        println!("Stockpile: {faction:?} {}", listing.join(", "));
    }
    if let Some(faction) = report.sole_survivor() {
        println!("Winner:    {faction:?}");
    }
}

/// Verify determinism by running the same scenario multiple times
fn cmd_verify(path: Option<&Path>, ticks: u64, runs: u32) -> Result<ExitCode, ScenarioError> {
    let scenario = load_scenario(path)?;
    tracing::info!(
        "Verifying determinism: {} for {} ticks ({} runs)",
        scenario.name,
        ticks,
        runs
    );

    let report = verify_scenario(&scenario, ticks, runs)?;

    if report.is_deterministic() {
        eprintln!("PASS: All {runs} runs produced identical results");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        for (run, hash) in report.hashes.iter().enumerate() {
            eprintln!("  run {run}: {hash:016x}");
        }
        Ok(ExitCode::FAILURE)
    }
}
