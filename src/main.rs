//! # Ferry - crossing simulation entry point
//!
//! ## Run Sequence
//!
//! 1. **Configuration** - defaults, then the TOML file, then CLI overrides
//! 2. **Recorders** - console, JSON lines and log sinks behind one fanout
//! 3. **Supervisor** - spawns the ferry and the vehicles on blocking threads
//! 4. **Shutdown** - the window elapsing or SIGINT/SIGTERM, whichever is first
//!
//! Tracing goes to stderr so the event stream on stdout stays clean.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

mod cli;

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ferry_crossing::{
    ConsoleRecorder, FanoutRecorder, JsonLinesRecorder, ShutdownSignal, SimulationConfig,
    SimulationReport, Supervisor, TracingRecorder, audit, read_json_lines,
};

use crate::cli::{Cli, Commands, RunArgs};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Config { config } => print_config(config.as_deref()),
        Commands::Audit { file, capacity } => audit_log(&file, capacity),
    }
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let config = args.resolve_config()?;
    let recorder = build_recorder(&args, &config)?;
    let supervisor = Supervisor::new(config, Arc::new(recorder))?;

    let simulation = tokio::task::spawn_blocking(move || supervisor.start())
        .await
        .context("startup thread panicked")?
        .context("Simulation failed to start")?;

    let coordinator = simulation.shutdown_coordinator();
    let mut runner = tokio::task::spawn_blocking(move || simulation.run_to_completion());

    let report = tokio::select! {
        joined = &mut runner => joined.context("supervisor thread panicked")?,
        () = wait_for_shutdown() => {
            coordinator.initiate(ShutdownSignal::Interrupt);
            runner.await.context("supervisor thread panicked")?
        }
    };

    debug!(phase = ?coordinator.phase(), "Supervisor finished");
    print_summary(&report)?;
    if !report.shutdown.is_clean() {
        warn!(
            abandoned = report.shutdown.actors_abandoned,
            "Some actors did not exit within the grace period"
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn build_recorder(args: &RunArgs, config: &SimulationConfig) -> Result<FanoutRecorder> {
    let mut recorder = FanoutRecorder::new();
    if !args.quiet {
        recorder = recorder.with(Arc::new(
            ConsoleRecorder::new().with_cutoff(config.operating_window()),
        ));
    }
    if args.log_events {
        recorder = recorder.with(Arc::new(TracingRecorder));
    }
    if let Some(path) = &args.events {
        let sink = JsonLinesRecorder::create(path)
            .with_context(|| format!("Cannot record events to {}", path.display()))?;
        info!(path = %sink.path().display(), "Recording events as JSON lines");
        recorder = recorder.with(Arc::new(sink));
    }
    Ok(recorder)
}

fn print_config(path: Option<&Path>) -> Result<ExitCode> {
    let config = match path {
        Some(path) => SimulationConfig::from_file(path)?,
        None => SimulationConfig::default(),
    };
    write!(io::stdout().lock(), "{}", config.to_toml_string()?)?;
    Ok(ExitCode::SUCCESS)
}

fn audit_log(path: &Path, capacity: Option<usize>) -> Result<ExitCode> {
    let events = read_json_lines(path)
        .with_context(|| format!("Cannot read event log {}", path.display()))?;
    let capacity = capacity.unwrap_or_else(|| SimulationConfig::default().capacity());
    let report = audit(&events, capacity);

    let mut out = io::stdout().lock();
    writeln!(out, "events:      {}", events.len())?;
    writeln!(out, "capacity:    {}", report.capacity)?;
    writeln!(out, "cycles:      {}", report.cycles_completed)?;
    writeln!(out, "departures:  {}", report.departures)?;
    writeln!(out, "max aboard:  {}", report.max_occupancy)?;
    if report.ended_mid_cycle() {
        writeln!(
            out,
            "log ends mid-cycle ({:?}, {} aboard)",
            report.final_phase, report.final_occupancy
        )?;
    }

    if report.is_clean() {
        writeln!(out, "no violations")?;
        Ok(ExitCode::SUCCESS)
    } else {
        for violation in &report.violations {
            writeln!(out, "violation: {violation}")?;
        }
        error!(violations = report.violations.len(), "Event log failed audit");
        Ok(ExitCode::FAILURE)
    }
}

fn print_summary(report: &SimulationReport) -> Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out)?;
    writeln!(out, "cycles completed:  {}", report.cycles_completed)?;
    for vehicle in &report.vehicles {
        writeln!(out, "  car {:>3}: {} trips", vehicle.id, vehicle.trips)?;
    }
    writeln!(out, "max aboard:        {} of {}", report.max_occupancy, report.capacity)?;
    writeln!(out, "shutdown:          {}", report.shutdown.signal)?;
    writeln!(out, "elapsed:           {:.3}s", report.elapsed_secs)?;
    out.flush().context("Cannot write summary to stdout")
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, stopping simulation"),
        () = terminate => info!("Received SIGTERM, stopping simulation"),
    }
}
