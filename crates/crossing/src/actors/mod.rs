//! Thread-per-actor ferry and vehicles.
//!
//! # Architecture
//!
//! One OS thread drives the ferry and one thread per vehicle rides it. They
//! share nothing but a [`Rendezvous`]:
//! - **Ferry**: opens boarding, waits for the departure latch, crosses,
//!   opens unboarding, waits for the empty latch, repeats
//! - **Vehicle**: waits at the boarding gate, counts itself aboard, waits at
//!   the unboarding gate, counts itself off, roams, requeues
//!
//! Both check the operating window and the shutdown coordinator only at the
//! top of a cycle (the ferry also once more before departing). Blocking waits
//! end early only when the supervisor interrupts the rendezvous.

pub mod ferry;
pub mod vehicle;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::clock::Clock;
use crate::config::SimulationConfig;
use crate::events::{Event, EventKind, EventRecorder, VehicleId};
use crate::rendezvous::Rendezvous;
use crate::shutdown::ShutdownCoordinator;

pub use ferry::{FerryActor, FerryState, FerryStats};
pub use vehicle::{VehicleActor, VehicleState, VehicleStats};

/// Why an actor left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// The deadline check at a loop boundary failed.
    WindowElapsed,
    /// Shutdown was requested before the next cycle started.
    ShutdownRequested,
    /// A blocking wait was interrupted mid-cycle.
    Interrupted,
}

/// Everything an actor needs, shared by reference with every other actor.
#[derive(Clone)]
pub struct ActorContext {
    pub config: Arc<SimulationConfig>,
    pub clock: Clock,
    pub rendezvous: Arc<Rendezvous>,
    pub shutdown: Arc<ShutdownCoordinator>,
    pub recorder: Arc<dyn EventRecorder>,
}

impl fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorContext")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("rendezvous", &self.rendezvous)
            .field("shutdown", &self.shutdown)
            .field("recorder", &"<EventRecorder>")
            .finish()
    }
}

impl ActorContext {
    /// Fresh primitives for `config`, with the clock starting now.
    #[must_use]
    pub fn new(config: SimulationConfig, recorder: Arc<dyn EventRecorder>) -> Self {
        let rendezvous = Arc::new(Rendezvous::new(config.capacity()));
        Self {
            config: Arc::new(config),
            clock: Clock::start(),
            rendezvous,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            recorder,
        }
    }

    /// Loop-boundary check: `Some` once the actor should not start another cycle.
    #[must_use]
    pub fn stop_reason(&self) -> Option<StopReason> {
        if self.shutdown.is_initiated() {
            Some(StopReason::ShutdownRequested)
        } else if self.clock.is_past(self.config.operating_window()) {
            Some(StopReason::WindowElapsed)
        } else {
            None
        }
    }

    pub(crate) fn emit_ferry(&self, kind: EventKind) {
        self.recorder
            .record(Event::ferry(kind, self.clock.elapsed_secs()));
    }

    pub(crate) fn emit_vehicle(&self, id: VehicleId, kind: EventKind) {
        self.recorder
            .record(Event::vehicle(id, kind, self.clock.elapsed_secs()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemoryRecorder;
    use crate::shutdown::ShutdownSignal;
    use std::time::Duration;

    #[test]
    fn test_stop_reason_running() {
        let ctx = ActorContext::new(SimulationConfig::default(), Arc::new(MemoryRecorder::new()));
        assert_eq!(ctx.stop_reason(), None);
    }

    #[test]
    fn test_stop_reason_window_elapsed() {
        let config = SimulationConfig::default().with_operating_window(Duration::from_millis(1));
        let ctx = ActorContext::new(config, Arc::new(MemoryRecorder::new()));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(ctx.stop_reason(), Some(StopReason::WindowElapsed));
    }

    #[test]
    fn test_stop_reason_shutdown_takes_precedence() {
        let config = SimulationConfig::default().with_operating_window(Duration::from_millis(1));
        let ctx = ActorContext::new(config, Arc::new(MemoryRecorder::new()));
        ctx.shutdown.initiate(ShutdownSignal::Programmatic);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(ctx.stop_reason(), Some(StopReason::ShutdownRequested));
    }

    #[test]
    fn test_emit_stamps_elapsed_time() {
        let recorder = Arc::new(MemoryRecorder::new());
        let ctx = ActorContext::new(SimulationConfig::default(), recorder.clone());
        ctx.emit_ferry(EventKind::ArrivedAtDock);
        ctx.emit_vehicle(VehicleId::new(1), EventKind::Boarded);
        let events = recorder.snapshot();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.elapsed_secs >= 0.0));
        assert_eq!(events.last().map(|e| e.actor_id), Some(Some(VehicleId::new(1))));
    }
}
