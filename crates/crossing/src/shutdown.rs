//! Shutdown coordination for a running simulation.
//!
//! Actors check [`ShutdownCoordinator::is_initiated`] at their loop
//! boundaries. Actors parked on a gate or latch are released separately by
//! interrupting the rendezvous; this module only carries the decision.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::info;

/// Why shutdown was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownSignal {
    /// The operating window ran out.
    WindowElapsed,
    /// SIGINT/SIGTERM from the operator.
    Interrupt,
    /// Requested from code.
    Programmatic,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WindowElapsed => write!(f, "WINDOW_ELAPSED"),
            Self::Interrupt => write!(f, "INTERRUPT"),
            Self::Programmatic => write!(f, "PROGRAMMATIC"),
        }
    }
}

/// Shutdown coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownPhase {
    /// Normal operation.
    Running,
    /// Shutdown requested; actors may still be mid-cycle.
    Initiating,
    /// Primitives interrupted, joining actor threads.
    StoppingActors,
    /// Every actor joined or was abandoned after the grace period.
    Complete,
}

#[derive(Debug)]
struct ShutdownState {
    phase: ShutdownPhase,
    signal: Option<ShutdownSignal>,
}

/// Carries the shutdown decision from whoever makes it to every actor.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    initiated: AtomicBool,
    state: Mutex<ShutdownState>,
    changed: Condvar,
}

impl ShutdownCoordinator {
    /// Create a coordinator in the running phase.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initiated: AtomicBool::new(false),
            state: Mutex::new(ShutdownState {
                phase: ShutdownPhase::Running,
                signal: None,
            }),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ShutdownState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> ShutdownPhase {
        self.lock().phase
    }

    /// Signal that started shutdown, if any.
    #[must_use]
    pub fn signal(&self) -> Option<ShutdownSignal> {
        self.lock().signal
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_initiated(&self) -> bool {
        self.initiated.load(Ordering::Acquire)
    }

    /// Request shutdown.
    ///
    /// Returns `false` if shutdown was already under way; the first signal wins.
    pub fn initiate(&self, signal: ShutdownSignal) -> bool {
        if self
            .initiated
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!(signal = %signal, "Shutdown already in progress, ignoring duplicate signal");
            return false;
        }

        info!(signal = %signal, "Initiating shutdown");
        let mut state = self.lock();
        state.phase = ShutdownPhase::Initiating;
        state.signal = Some(signal);
        drop(state);
        self.changed.notify_all();
        true
    }

    /// Block until shutdown is requested or `timeout` passes.
    ///
    /// Returns whether shutdown was requested.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .changed
            .wait_timeout_while(state, timeout, |state| state.phase == ShutdownPhase::Running)
            .unwrap_or_else(PoisonError::into_inner);
        state.phase != ShutdownPhase::Running
    }

    pub(crate) fn advance(&self, phase: ShutdownPhase) {
        let mut state = self.lock();
        state.phase = phase;
        drop(state);
        self.changed.notify_all();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about the shutdown process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownStats {
    /// Signal that ended the run.
    pub signal: ShutdownSignal,
    /// Actor threads that exited within the grace period.
    pub actors_joined: usize,
    /// Actor threads left running or that panicked.
    pub actors_abandoned: usize,
    /// Time from the shutdown request until the last join.
    pub duration_ms: u64,
}

impl ShutdownStats {
    pub(crate) fn finished(
        signal: ShutdownSignal,
        started: Instant,
        actors_joined: usize,
        actors_abandoned: usize,
    ) -> Self {
        Self {
            signal,
            actors_joined,
            actors_abandoned,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Whether every actor thread exited cleanly.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.actors_abandoned == 0
    }
}
