//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use ferry_crossing::SimulationConfig;

/// Ferry crossing simulation
#[derive(Parser, Debug)]
#[command(name = "ferry")]
#[command(version)]
#[command(about = "Capacity-bounded ferry crossing simulation")]
#[command(
    long_about = "Runs a ferry of fixed capacity and a pool of vehicle threads through repeated boarding, crossing and unboarding cycles, and audits recorded event logs."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one simulation for its operating window
    Run(RunArgs),

    /// Print the effective configuration as TOML
    Config {
        /// Configuration file to load instead of the defaults
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Verify a recorded JSON-lines event log
    Audit {
        /// Event log written by `ferry run --events`
        file: PathBuf,

        /// Ferry capacity the log was recorded with
        #[arg(short = 'n', long)]
        capacity: Option<usize>,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ferry capacity and vehicle pool size
    #[arg(short = 'n', long)]
    pub capacity: Option<usize>,

    /// Operating window in seconds
    #[arg(short, long)]
    pub window_secs: Option<f64>,

    /// Crossing duration in seconds
    #[arg(long)]
    pub crossing_secs: Option<f64>,

    /// Also write every event to this file as JSON lines
    #[arg(short, long)]
    pub events: Option<PathBuf>,

    /// Do not print events to stdout
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,

    /// Forward events to the log as well
    #[arg(long, default_value_t = false)]
    pub log_events: bool,
}

impl RunArgs {
    /// Load the configuration file (or defaults) and apply command-line overrides.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, an override is not a
    /// valid duration, or the result does not validate.
    pub fn resolve_config(&self) -> Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::from_file(path)?,
            None => SimulationConfig::default(),
        };

        if let Some(capacity) = self.capacity {
            config.capacity = capacity;
        }
        if let Some(secs) = self.window_secs {
            config = config.with_operating_window(
                Duration::try_from_secs_f64(secs).context("invalid --window-secs")?,
            );
        }
        if let Some(secs) = self.crossing_secs {
            config = config.with_crossing_duration(
                Duration::try_from_secs_f64(secs).context("invalid --crossing-secs")?,
            );
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::unreachable)]

    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "ferry",
            "run",
            "--capacity",
            "3",
            "--window-secs",
            "2.5",
            "--quiet",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            unreachable!("expected run");
        };
        assert_eq!(args.capacity, Some(3));
        assert!(args.quiet);

        let config = args.resolve_config().unwrap();
        assert_eq!(config.capacity(), 3);
        assert_eq!(config.operating_window(), Duration::from_millis(2500));
        assert_eq!(config.crossing_duration(), Duration::from_secs(3));
    }

    #[test]
    fn test_parse_audit() {
        let cli = Cli::try_parse_from(["ferry", "audit", "events.jsonl", "-n", "2"]).unwrap();
        let Commands::Audit { file, capacity } = cli.command else {
            unreachable!("expected audit");
        };
        assert_eq!(file, PathBuf::from("events.jsonl"));
        assert_eq!(capacity, Some(2));
    }

    #[test]
    fn test_resolve_config_rejects_zero_capacity() {
        let args = RunArgs {
            capacity: Some(0),
            ..RunArgs::default()
        };
        assert!(args.resolve_config().is_err());
    }

    #[test]
    fn test_resolve_config_rejects_negative_window() {
        let args = RunArgs {
            window_secs: Some(-1.0),
            ..RunArgs::default()
        };
        assert!(args.resolve_config().is_err());
    }

    #[test]
    fn test_override_applies_on_top_of_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "capacity = 4\ncrossing_duration_ms = 500").unwrap();

        let args = RunArgs {
            config: Some(file.path().to_path_buf()),
            crossing_secs: Some(1.0),
            ..RunArgs::default()
        };
        let config = args.resolve_config().unwrap();
        assert_eq!(config.capacity(), 4);
        assert_eq!(config.crossing_duration(), Duration::from_secs(1));
    }
}
