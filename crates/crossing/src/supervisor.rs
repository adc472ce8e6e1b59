//! Starts the actors, holds the operating window open, then stops everything.
//!
//! Shutdown is a hard stop, not a drain: the supervisor requests shutdown,
//! interrupts every signal so parked actors return immediately, and joins
//! each thread within the grace period. A cycle caught half way is abandoned
//! as it stands.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use ferry_core::{Error, Result, ResultExt};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::actors::{ActorContext, FerryActor, FerryStats, VehicleActor, VehicleStats};
use crate::clock::Clock;
use crate::config::SimulationConfig;
use crate::events::{EventRecorder, VehicleId};
use crate::rendezvous::Rendezvous;
use crate::shutdown::{ShutdownCoordinator, ShutdownPhase, ShutdownSignal, ShutdownStats};

/// How often a joining supervisor checks whether a thread has exited.
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Builds and launches one simulation.
pub struct Supervisor {
    config: SimulationConfig,
    recorder: Arc<dyn EventRecorder>,
}

impl Supervisor {
    /// Create a supervisor for a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if `config` fails validation.
    pub fn new(config: SimulationConfig, recorder: Arc<dyn EventRecorder>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, recorder })
    }

    /// Spawn the ferry, then each vehicle after its spawn stagger.
    ///
    /// If any thread fails to spawn, the actors already running are stopped
    /// and joined before the error is returned; nothing is left half started.
    ///
    /// # Errors
    ///
    /// Returns `Error::InitializationFailed` if a thread cannot be spawned.
    pub fn start(self) -> Result<Simulation> {
        let ctx = ActorContext::new(self.config, self.recorder);
        let capacity = ctx.config.capacity();
        info!(
            capacity,
            window_ms = ctx.config.operating_window_ms,
            crossing_ms = ctx.config.crossing_duration_ms,
            "Starting ferry simulation"
        );

        let ferry = FerryActor::new(ctx.clone())
            .spawn()
            .inspect_error(|e| error!(error = %e, "Aborting startup"))?;
        let mut simulation = Simulation {
            ctx,
            ferry,
            vehicles: Vec::with_capacity(capacity),
        };

        let mut rng = rand::thread_rng();
        for id in VehicleId::pool(capacity) {
            let stagger = simulation.ctx.config.spawn_stagger.sample(&mut rng);
            if simulation.ctx.shutdown.wait_for(stagger) {
                warn!(spawned = simulation.vehicles.len(), "Shutdown requested during startup");
                break;
            }

            match VehicleActor::new(id, simulation.ctx.clone()).spawn() {
                Ok(handle) => simulation.vehicles.push((id, handle)),
                Err(e) => {
                    error!(vehicle = %id, error = %e, "Aborting startup");
                    let _ = simulation.stop(ShutdownSignal::Programmatic);
                    return Err(e);
                }
            }
        }

        info!(vehicles = simulation.vehicles.len(), "All actors running");
        Ok(simulation)
    }

    /// Start, run for the operating window (or until shutdown), stop.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Supervisor::start`].
    pub fn run(self) -> Result<SimulationReport> {
        Ok(self.start()?.run_to_completion())
    }
}

/// A running simulation.
pub struct Simulation {
    ctx: ActorContext,
    ferry: JoinHandle<FerryStats>,
    vehicles: Vec<(VehicleId, JoinHandle<VehicleStats>)>,
}

impl Simulation {
    /// Handle for requesting an early stop from another thread.
    #[must_use]
    pub fn shutdown_coordinator(&self) -> Arc<ShutdownCoordinator> {
        Arc::clone(&self.ctx.shutdown)
    }

    /// The primitives shared by the actors.
    #[must_use]
    pub fn rendezvous(&self) -> Arc<Rendezvous> {
        Arc::clone(&self.ctx.rendezvous)
    }

    /// The simulation clock.
    #[must_use]
    pub const fn clock(&self) -> Clock {
        self.ctx.clock
    }

    /// Number of vehicle threads started.
    #[must_use]
    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Sleep until the operating window ends or shutdown is requested.
    #[must_use]
    pub fn wait(&self) -> ShutdownSignal {
        let remaining = self.ctx.clock.remaining(self.ctx.config.operating_window());
        if self.ctx.shutdown.wait_for(remaining) {
            self.ctx
                .shutdown
                .signal()
                .unwrap_or(ShutdownSignal::Programmatic)
        } else {
            ShutdownSignal::WindowElapsed
        }
    }

    /// Wait out the window, then stop.
    #[must_use]
    pub fn run_to_completion(self) -> SimulationReport {
        let signal = self.wait();
        self.stop(signal)
    }

    /// Stop every actor and collect the results.
    ///
    /// Threads that do not exit within the grace period, or that panicked,
    /// are logged and counted as abandoned.
    #[must_use]
    pub fn stop(self, signal: ShutdownSignal) -> SimulationReport {
        let started = Instant::now();
        let shutdown = Arc::clone(&self.ctx.shutdown);
        shutdown.initiate(signal);
        let signal = shutdown.signal().unwrap_or(signal);

        shutdown.advance(ShutdownPhase::StoppingActors);
        self.ctx.rendezvous.interrupt_all();

        let deadline = started
            .checked_add(self.ctx.config.effective_shutdown_grace())
            .unwrap_or(started);

        let spawned = self.vehicles.len().saturating_add(1);
        let ferry = join_within(self.ferry, deadline, "ferry thread").into_option_logged();
        let vehicles: Vec<VehicleStats> = self
            .vehicles
            .into_iter()
            .filter_map(|(id, handle)| {
                join_within(handle, deadline, &format!("vehicle {id} thread")).into_option_logged()
            })
            .collect();

        let joined = vehicles.len().saturating_add(usize::from(ferry.is_some()));
        let abandoned = spawned.saturating_sub(joined);

        self.ctx.recorder.flush().into_option_logged();
        shutdown.advance(ShutdownPhase::Complete);

        let stats = ShutdownStats::finished(signal, started, joined, abandoned);
        info!(
            signal = %stats.signal,
            joined = stats.actors_joined,
            abandoned = stats.actors_abandoned,
            duration_ms = stats.duration_ms,
            "Simulation stopped"
        );

        let rendezvous = &self.ctx.rendezvous;
        debug!(leftovers = ?rendezvous.leftovers(), "Unconsumed signals at shutdown");
        SimulationReport {
            capacity: rendezvous.capacity(),
            cycles_completed: ferry.map_or(0, |f| f.cycles_completed),
            ferry,
            vehicles,
            boarding_permits_posted: rendezvous.boarding.posts(),
            departure_posts: rendezvous.departure.posts(),
            unboarding_permits_posted: rendezvous.unboarding.posts(),
            empty_posts: rendezvous.empty.posts(),
            max_occupancy: rendezvous.occupancy.high_water_mark(),
            final_occupancy: rendezvous.occupancy.current(),
            elapsed_secs: self.ctx.clock.elapsed_secs(),
            shutdown: stats,
        }
    }
}

/// Wait for `handle` until `deadline`, then give up on it.
fn join_within<T>(handle: JoinHandle<T>, deadline: Instant, what: &str) -> Result<T> {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return Err(Error::teardown_failed(
                what,
                "did not exit within the shutdown grace period",
            ));
        }
        thread::sleep(JOIN_POLL_INTERVAL);
    }
    handle
        .join()
        .map_err(|_| Error::teardown_failed(what, "thread panicked"))
}

/// Outcome of one simulation.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Ferry capacity.
    pub capacity: usize,
    /// Full cycles the ferry completed.
    pub cycles_completed: u64,
    /// Ferry thread result, if it joined.
    pub ferry: Option<FerryStats>,
    /// Vehicle thread results that joined, in identity order.
    pub vehicles: Vec<VehicleStats>,
    /// Permits ever posted to the boarding gate.
    pub boarding_permits_posted: u64,
    /// Posts to the departure latch.
    pub departure_posts: u64,
    /// Permits ever posted to the unboarding gate.
    pub unboarding_permits_posted: u64,
    /// Posts to the empty latch.
    pub empty_posts: u64,
    /// Highest occupancy reached.
    pub max_occupancy: usize,
    /// Occupancy when the run was stopped.
    pub final_occupancy: usize,
    /// Seconds from start until the report was built.
    pub elapsed_secs: f64,
    /// How shutdown went.
    pub shutdown: ShutdownStats,
}

impl SimulationReport {
    /// Trips completed by one vehicle, if its thread joined.
    #[must_use]
    pub fn trips(&self, id: VehicleId) -> Option<u64> {
        self.vehicles.iter().find(|v| v.id == id).map(|v| v.trips)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::config::JitterRange;
    use crate::events::MemoryRecorder;

    fn fast_config(capacity: usize, window: Duration) -> SimulationConfig {
        SimulationConfig::with_capacity(capacity)
            .with_operating_window(window)
            .with_crossing_duration(Duration::from_millis(20))
            .with_boarding_jitter(JitterRange::from_millis(1, 2))
            .with_unboarding_jitter(JitterRange::from_millis(1, 2))
            .with_roam(JitterRange::from_millis(2, 5))
            .with_spawn_stagger(JitterRange::from_millis(1, 3))
            .with_shutdown_grace(Duration::from_secs(2))
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = Supervisor::new(
            SimulationConfig::with_capacity(0),
            Arc::new(MemoryRecorder::new()),
        );
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_run_completes_cycles_and_joins_everything() {
        let recorder = Arc::new(MemoryRecorder::new());
        let supervisor =
            Supervisor::new(fast_config(2, Duration::from_millis(400)), recorder.clone()).unwrap();

        let report = supervisor.run().unwrap();

        assert!(report.cycles_completed >= 1);
        assert!(report.shutdown.is_clean());
        assert_eq!(report.shutdown.actors_joined, 3);
        assert_eq!(report.shutdown.signal, ShutdownSignal::WindowElapsed);
        assert_eq!(report.vehicles.len(), 2);
        assert!(report.max_occupancy <= 2);
        assert!(report.empty_posts >= report.cycles_completed);
        assert!(!recorder.is_empty());
    }

    #[test]
    fn test_programmatic_stop_ends_run_early() {
        let recorder = Arc::new(MemoryRecorder::new());
        let supervisor =
            Supervisor::new(fast_config(3, Duration::from_secs(60)), recorder).unwrap();
        let simulation = supervisor.start().unwrap();
        let coordinator = simulation.shutdown_coordinator();

        let trigger = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            coordinator.initiate(ShutdownSignal::Programmatic);
        });

        let started = Instant::now();
        let report = simulation.run_to_completion();
        trigger.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(report.shutdown.signal, ShutdownSignal::Programmatic);
        assert!(report.shutdown.is_clean());
    }

    #[test]
    fn test_stop_interrupts_rendezvous() {
        let supervisor = Supervisor::new(
            fast_config(1, Duration::from_secs(60)),
            Arc::new(MemoryRecorder::new()),
        )
        .unwrap();
        let simulation = supervisor.start().unwrap();
        let rendezvous = simulation.rendezvous();

        let report = simulation.stop(ShutdownSignal::Interrupt);

        assert!(rendezvous.is_interrupted());
        assert_eq!(report.shutdown.signal, ShutdownSignal::Interrupt);
        assert_eq!(report.capacity, 1);
    }

    #[test]
    fn test_short_grace_still_joins_ferry_mid_crossing() {
        let config = fast_config(2, Duration::from_millis(300))
            .with_crossing_duration(Duration::from_millis(1_500))
            .with_shutdown_grace(Duration::from_millis(200));
        let supervisor = Supervisor::new(config, Arc::new(MemoryRecorder::new())).unwrap();

        let report = supervisor.run().unwrap();

        assert!(report.ferry.is_some());
        assert!(report.shutdown.is_clean());
        assert_eq!(report.shutdown.actors_joined, 3);
        assert_eq!(report.vehicles.len(), 2);
    }

    #[test]
    fn test_join_within_gives_up_after_deadline() {
        let handle = thread::spawn(|| thread::sleep(Duration::from_millis(300)));
        let deadline = Instant::now().checked_add(Duration::from_millis(20)).unwrap();
        let result = join_within(handle, deadline, "sleeper");
        assert!(matches!(result, Err(Error::TeardownFailed { .. })));
    }

    #[test]
    fn test_join_within_returns_thread_result() {
        let handle = thread::spawn(|| 7_u32);
        let deadline = Instant::now().checked_add(Duration::from_secs(1)).unwrap();
        assert_eq!(join_within(handle, deadline, "seven").unwrap(), 7);
    }
}
