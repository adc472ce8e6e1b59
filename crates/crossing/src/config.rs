//! Configuration for a ferry simulation run.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::Path;
use std::time::Duration;

use ferry_core::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Inclusive range of milliseconds a modeled delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitterRange {
    /// Shortest delay in milliseconds.
    pub min_ms: u64,
    /// Longest delay in milliseconds.
    pub max_ms: u64,
}

impl JitterRange {
    /// Create a range from bounds in milliseconds.
    #[must_use]
    pub const fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// A range that always yields zero.
    #[must_use]
    pub const fn none() -> Self {
        Self::from_millis(0, 0)
    }

    /// Draw a delay from the range.
    ///
    /// An inverted range yields its lower bound.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }

    /// Longest delay the range can produce.
    #[must_use]
    pub const fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    fn validate(&self, field: &str) -> Result<()> {
        if self.min_ms > self.max_ms {
            Err(Error::invalid_config(
                field,
                format!("min_ms ({}) exceeds max_ms ({})", self.min_ms, self.max_ms),
            ))
        } else {
            Ok(())
        }
    }
}

/// Configuration for one simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Ferry capacity; also the size of the vehicle pool.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Operating window measured from simulation start.
    #[serde(default = "default_operating_window_ms")]
    pub operating_window_ms: u64,

    /// Time spent crossing with a full load.
    #[serde(default = "default_crossing_duration_ms")]
    pub crossing_duration_ms: u64,

    /// Bounded wait for each actor thread to join at shutdown; raised to
    /// cover [`SimulationConfig::drain_time`] when shorter.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Delay held inside the occupancy lock while a vehicle boards.
    #[serde(default = "default_boarding_jitter")]
    pub boarding_jitter: JitterRange,

    /// Delay between the unboarding permit and the disembark observation.
    #[serde(default = "default_unboarding_jitter")]
    pub unboarding_jitter: JitterRange,

    /// Free roam time before a vehicle requeues.
    #[serde(default = "default_roam")]
    pub roam: JitterRange,

    /// Delay before each vehicle thread is created.
    #[serde(default = "default_spawn_stagger")]
    pub spawn_stagger: JitterRange,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            operating_window_ms: default_operating_window_ms(),
            crossing_duration_ms: default_crossing_duration_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            boarding_jitter: default_boarding_jitter(),
            unboarding_jitter: default_unboarding_jitter(),
            roam: default_roam(),
            spawn_stagger: default_spawn_stagger(),
        }
    }
}

impl SimulationConfig {
    /// Default configuration with the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    /// Parse a TOML document; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the document does not parse or the
    /// resulting configuration fails validation.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| Error::invalid_config("toml", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigReadFailed` if the file cannot be read, or any
    /// error from [`SimulationConfig::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::config_read_failed(path, e.to_string()))?;
        Self::from_toml_str(&source)
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::invalid_config("toml", e.to_string()))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::invalid_config("capacity", "must be greater than 0"));
        }
        if u32::try_from(self.capacity).is_err() {
            return Err(Error::invalid_config(
                "capacity",
                "must fit the vehicle identity range",
            ));
        }
        if self.operating_window_ms == 0 {
            return Err(Error::invalid_config(
                "operating_window_ms",
                "must be greater than 0",
            ));
        }
        if self.shutdown_grace_ms == 0 {
            return Err(Error::invalid_config(
                "shutdown_grace_ms",
                "must be greater than 0",
            ));
        }
        self.boarding_jitter.validate("boarding_jitter")?;
        self.unboarding_jitter.validate("unboarding_jitter")?;
        self.roam.validate("roam")?;
        self.spawn_stagger.validate("spawn_stagger")?;
        Ok(())
    }

    /// Set the operating window.
    #[must_use]
    pub fn with_operating_window(mut self, window: Duration) -> Self {
        self.operating_window_ms = duration_to_millis(window);
        self
    }

    /// Set the crossing duration.
    #[must_use]
    pub fn with_crossing_duration(mut self, crossing: Duration) -> Self {
        self.crossing_duration_ms = duration_to_millis(crossing);
        self
    }

    /// Set the boarding jitter range.
    #[must_use]
    pub fn with_boarding_jitter(mut self, jitter: JitterRange) -> Self {
        self.boarding_jitter = jitter;
        self
    }

    /// Set the unboarding jitter range.
    #[must_use]
    pub fn with_unboarding_jitter(mut self, jitter: JitterRange) -> Self {
        self.unboarding_jitter = jitter;
        self
    }

    /// Set the roam range.
    #[must_use]
    pub fn with_roam(mut self, roam: JitterRange) -> Self {
        self.roam = roam;
        self
    }

    /// Set the spawn stagger range.
    #[must_use]
    pub fn with_spawn_stagger(mut self, stagger: JitterRange) -> Self {
        self.spawn_stagger = stagger;
        self
    }

    /// Set the shutdown grace period.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace_ms = duration_to_millis(grace);
        self
    }

    /// Ferry capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Operating window.
    #[must_use]
    pub const fn operating_window(&self) -> Duration {
        Duration::from_millis(self.operating_window_ms)
    }

    /// Crossing duration.
    #[must_use]
    pub const fn crossing_duration(&self) -> Duration {
        Duration::from_millis(self.crossing_duration_ms)
    }

    /// Shutdown grace period.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Longest an actor can take to reach a stop point once interrupted.
    ///
    /// Sleeps always run to completion: the ferry may be mid crossing, a
    /// vehicle may wait behind every other boarder's hold, or be between
    /// its unboarding delay and its roam.
    #[must_use]
    pub fn drain_time(&self) -> Duration {
        let capacity = u32::try_from(self.capacity).unwrap_or(u32::MAX);
        let boarding = self.boarding_jitter.max().saturating_mul(capacity);
        let leaving = self.unboarding_jitter.max().saturating_add(self.roam.max());
        self.crossing_duration().max(boarding).max(leaving)
    }

    /// Grace period actually granted at shutdown.
    ///
    /// Never shorter than [`SimulationConfig::drain_time`] plus a margin, so
    /// every actor is joined rather than abandoned mid-sleep.
    #[must_use]
    pub fn effective_shutdown_grace(&self) -> Duration {
        self.shutdown_grace()
            .max(self.drain_time().saturating_add(DRAIN_MARGIN))
    }

    /// Rough upper estimate of one full cycle, used for liveness bounds.
    ///
    /// Boarding jitter is serialized by the counter lock, so it scales with
    /// capacity; roaming overlaps with nothing once the ferry waits for it.
    #[must_use]
    pub fn estimated_cycle_time(&self) -> Duration {
        let capacity = u32::try_from(self.capacity).unwrap_or(u32::MAX);
        self.boarding_jitter
            .max()
            .saturating_mul(capacity)
            .saturating_add(self.crossing_duration())
            .saturating_add(self.unboarding_jitter.max())
            .saturating_add(self.roam.max())
    }
}

/// Slack added to [`SimulationConfig::drain_time`] before giving up on a thread.
const DRAIN_MARGIN: Duration = Duration::from_millis(500);

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

const fn default_capacity() -> usize {
    5
}

const fn default_operating_window_ms() -> u64 {
    60_000
}

const fn default_crossing_duration_ms() -> u64 {
    3_000
}

const fn default_boarding_jitter() -> JitterRange {
    JitterRange::from_millis(10, 50)
}

const fn default_unboarding_jitter() -> JitterRange {
    JitterRange::from_millis(5, 25)
}

const fn default_roam() -> JitterRange {
    JitterRange::from_millis(500, 1_500)
}

const fn default_spawn_stagger() -> JitterRange {
    JitterRange::from_millis(1, 999)
}

const fn default_shutdown_grace_ms() -> u64 {
    5_000
}
