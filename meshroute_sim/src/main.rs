//! meshroute Simulator CLI
//!
//! Run a routing query across the regional nodes and report the speedup
//! of the parallel fan-out.

use clap::Parser;
use meshroute_core::{LocationCatalog, Scenario};
use meshroute_env::CompletionScheduler;
use meshroute_sim::{Coordinator, CoordinatorConfig, RpcEnvelope, RunReport, SimError};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// meshroute parallel routing simulator
#[derive(Parser, Debug)]
#[command(name = "meshroute-sim")]
#[command(about = "Simulate congestion-aware routing over parallel regional nodes", long_about = None)]
struct Args {
    /// Source location id
    #[arg(long, default_value = "delhi")]
    source: String,

    /// Destination location id
    #[arg(long, default_value = "mumbai")]
    destination: String,

    /// Traffic scenario (light, normal, rush, accident, all)
    #[arg(short = 'S', long, default_value = "normal")]
    scenario: String,

    /// Seed for reproducible runs (omit for fresh randomness)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Really wait for each call instead of using the virtual clock
    #[arg(long)]
    realtime: bool,

    /// Give up on calls still outstanding after this long
    #[arg(long, default_value = "10000")]
    deadline_ms: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for scripting
    #[arg(long)]
    json: bool,

    /// Write the run report to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Location catalog (JSON) to use instead of the built-in one
    #[arg(long)]
    catalog: Option<PathBuf>,
}

async fn drive<S: CompletionScheduler<RpcEnvelope>>(
    mut coordinator: Coordinator<S>,
    source: &str,
    destination: &str,
) -> RunReport {
    // Failures are already logged and kept in the state
    if let Err(e) = coordinator.run(source, destination).await {
        warn!("Run ended early: {}", e);
    }
    RunReport::from_state(coordinator.config(), coordinator.state())
}

async fn run_scenario(args: &Args, catalog: Arc<LocationCatalog>, scenario: Scenario) -> RunReport {
    let mut config = CoordinatorConfig::new(scenario)
        .with_processing_deadline(Duration::from_millis(args.deadline_ms));
    config.seed = args.seed;

    if args.realtime {
        drive(Coordinator::realtime(config, catalog), &args.source, &args.destination).await
    } else {
        drive(Coordinator::virtual_clock(config, catalog), &args.source, &args.destination).await
    }
}

fn load_catalog(path: Option<&PathBuf>) -> Result<LocationCatalog, SimError> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            Ok(LocationCatalog::from_json(&json)?)
        }
        None => Ok(LocationCatalog::india()),
    }
}

fn print_report(report: &RunReport) {
    let scenario = report.config.scenario;
    match (&report.route, &report.metrics) {
        (Some(route), Some(metrics)) => {
            info!("✓ {} route: {}", scenario, route.path_ids.join(" → "));
            info!(
                "  {:.0} km | {:.0} min | {:.1} km/h | {} congestion",
                route.total_distance, route.estimated_time, route.average_speed, route.congestion_level
            );
            info!(
                "  parallel {} ms vs sequential {} ms → {:.2}x speedup ({:.0}% efficiency)",
                metrics.parallel_time_ms,
                metrics.sequential_time_ms,
                metrics.speedup_factor,
                metrics.efficiency
            );
            info!(
                "  {}/{} regions answered",
                metrics.successful_requests, metrics.total_requests
            );
        }
        _ => error!(
            "✗ {} FAILED: {}",
            scenario,
            report.error.as_deref().unwrap_or("unknown")
        ),
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let scenarios: Vec<Scenario> = if args.scenario == "all" {
        Scenario::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: light, normal, rush, accident, all");
            std::process::exit(2);
        })]
    };

    if args.export.is_some() && scenarios.len() > 1 {
        eprintln!("Error: --export only supports a single scenario, not 'all'");
        std::process::exit(2);
    }

    let catalog = match load_catalog(args.catalog.as_ref()) {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    if !args.json {
        info!("meshroute simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!(
            "{} → {} | {} clock | seed {}",
            args.source,
            args.destination,
            if args.realtime { "real-time" } else { "virtual" },
            args.seed.map(|s| s.to_string()).unwrap_or_else(|| "random".into())
        );
    }

    let mut reports = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let report = run_scenario(&args, Arc::clone(&catalog), scenario).await;
        if !args.json {
            print_report(&report);
        }
        reports.push(report);
    }

    if let (Some(path), [report]) = (&args.export, reports.as_slice()) {
        match report.write_to_file(path) {
            Ok(()) => info!("Exported run report to {}", path.display()),
            Err(e) => error!("Failed to write export: {:?}", e),
        }
    }

    let failed = reports.iter().filter(|r| !r.succeeded()).count();

    if args.json {
        let output = if reports.len() == 1 {
            serde_json::to_string_pretty(&reports[0])
        } else {
            serde_json::to_string_pretty(&reports)
        };
        match output {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    } else if reports.len() > 1 {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("{:<10} {:>10} {:>12} {:>9} {:>8}", "scenario", "parallel", "sequential", "speedup", "nodes");
        for report in &reports {
            match &report.metrics {
                Some(m) => info!(
                    "{:<10} {:>8}ms {:>10}ms {:>8.2}x {:>6}/{}",
                    report.config.scenario.name(),
                    m.parallel_time_ms,
                    m.sequential_time_ms,
                    m.speedup_factor,
                    m.successful_requests,
                    m.total_requests
                ),
                None => info!("{:<10} {:>10}", report.config.scenario.name(), "failed"),
            }
        }
    }

    // Exit with proper code for scripting
    if failed > 0 {
        if !args.json {
            error!("❌ {}/{} runs failed", failed, reports.len());
        }
        std::process::exit(1);
    }
}
