//! Orrery Simulator CLI
//!
//! Run deterministic viewer scenarios against a headless scene.

use clap::Parser;
use orrery_core::ViewerConfig;
use orrery_sim::scenarios::ScenarioId;
use orrery_sim::{load_json, ScenarioResult, ScenarioRunner};
use std::fs;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Orrery deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "orrery-sim")]
#[command(about = "Run deterministic viewer scenarios for Orrery", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Particles in generated datasets
    #[arg(short, long, default_value = "300")]
    particles: usize,

    /// Scenario to run (declump, label_sweep, fly_cancel, ..., standard, stress, all)
    #[arg(short = 'S', long, default_value = "standard")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Free-running duration in seconds
    #[arg(short, long, default_value = "10")]
    duration: f64,

    /// Frame rate in Hz
    #[arg(long, default_value = "60")]
    tick_rate: u32,

    /// Viewer configuration (JSON, partial files allowed)
    #[arg(short, long)]
    config: Option<String>,

    /// Dataset to use instead of generated particles (JSON array of records)
    #[arg(long)]
    dataset: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export frames of a single scenario to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn parse_scenarios(name: &str) -> Result<Vec<ScenarioId>, String> {
    match name {
        "all" => Ok(ScenarioId::all()),
        "standard" => Ok(ScenarioId::standard()),
        "stress" => Ok(ScenarioId::stress()),
        other => other.parse().map(|s| vec![s]),
    }
}

fn build_runner(args: &Args, seed: u64) -> Result<ScenarioRunner, String> {
    let mut runner = ScenarioRunner::new(seed, args.particles)
        .with_duration(args.duration)
        .with_tick_rate(args.tick_rate);

    if let Some(path) = &args.config {
        let text = fs::read_to_string(path).map_err(|e| format!("{}: {}", path, e))?;
        let config = ViewerConfig::from_json(&text).map_err(|e| format!("{}: {}", path, e))?;
        runner = runner.with_viewer_config(config);
    }
    if let Some(path) = &args.dataset {
        let records = load_json(path).map_err(|e| format!("{}: {}", path, e))?;
        info!("Loaded {} records from {}", records.len(), path);
        runner = runner.with_dataset(records);
    }
    Ok(runner)
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("Orrery Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenarios = match parse_scenarios(&args.scenario) {
        Ok(scenarios) => scenarios,
        Err(e) => {
            eprintln!("Error: {}", e);
            let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
            eprintln!("Available scenarios: {}, standard, stress, all", names.join(", "));
            return ExitCode::FAILURE;
        }
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    // Handle --export mode
    if let Some(export_path) = &args.export {
        let [scenario] = scenarios.as_slice() else {
            eprintln!("Error: --export only supports a single scenario");
            return ExitCode::FAILURE;
        };
        let runner = match build_runner(&args, base_seed) {
            Ok(runner) => runner,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        };

        let (result, export) = runner.run_exported(*scenario);
        match export.write_to_file(export_path) {
            Ok(()) => info!("Exported {} frames to {}", export.frames.len(), export_path),
            Err(e) => error!("Failed to write export: {:?}", e),
        }
        report(&result, args.json);
        return if result.passed { ExitCode::SUCCESS } else { ExitCode::FAILURE };
    }

    // Run simulations
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = match build_runner(&args, seed) {
            Ok(runner) => runner,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        };

        for scenario in &scenarios {
            let result = runner.run(*scenario);
            if !args.json {
                report(&result, false);
            }
            all_results.push(result);
        }
    }

    let failed_count = all_results.iter().filter(|r| !r.passed).count();
    summarize(&all_results, failed_count, args.json);

    // Exit with proper code for CI
    if failed_count > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn report(result: &ScenarioResult, json: bool) {
    if json {
        match serde_json::to_string_pretty(result) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to serialize result: {}", e),
        }
    } else if result.passed {
        info!("✓ {} (seed={}) PASSED", result.scenario, result.seed);
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario,
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}

fn summarize(results: &[ScenarioResult], failed_count: usize, json: bool) {
    let total = results.len();

    if json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed_count,
            "failed": failed_count,
            "results": results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to serialize summary: {}", e),
        }
        return;
    }

    info!("");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if failed_count == 0 {
        info!("✅ All {} scenario runs passed!", total);
    } else {
        error!("❌ {}/{} scenario runs failed!", failed_count, total);
        for result in results.iter().filter(|r| !r.passed) {
            error!(
                "  - {} seed={}: {}",
                result.scenario,
                result.seed,
                result.failure_reason.as_deref().unwrap_or("unknown")
            );
        }
    }
}
