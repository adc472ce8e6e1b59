#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! The ferry: drives every cycle and never boards anything itself.

use std::thread::{self, JoinHandle};

use ferry_core::{Error, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::actors::{ActorContext, StopReason};
use crate::events::EventKind;
use crate::signal::WaitOutcome;

/// Ferry lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FerryState {
    /// Docked before the first cycle.
    Docked,
    /// Boarding gate open, waiting for the departure latch.
    Boarding,
    /// Sailing with a full load.
    Crossing,
    /// Unboarding gate open, waiting for the empty latch.
    Unboarding,
    /// Out of the loop.
    Stopped,
}

/// What the ferry thread returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FerryStats {
    /// Cycles that ended with the ferry emptied.
    pub cycles_completed: u64,
    /// State the ferry was in when it stopped.
    pub stopped_in: FerryState,
    /// Why it stopped.
    pub stop_reason: StopReason,
}

/// The single cycle driver.
#[derive(Debug)]
pub struct FerryActor {
    ctx: ActorContext,
    state: FerryState,
    cycles_completed: u64,
}

impl FerryActor {
    /// Create a docked ferry.
    #[must_use]
    pub const fn new(ctx: ActorContext) -> Self {
        Self {
            ctx,
            state: FerryState::Docked,
            cycles_completed: 0,
        }
    }

    /// Run the ferry on its own thread.
    ///
    /// # Errors
    ///
    /// Returns `Error::InitializationFailed` if the thread cannot be spawned.
    pub fn spawn(self) -> Result<JoinHandle<FerryStats>> {
        thread::Builder::new()
            .name("ferry".to_string())
            .spawn(move || self.run())
            .map_err(|e| Error::initialization_failed("ferry thread", e.to_string()))
    }

    /// Drive cycles until the window closes or the rendezvous is interrupted.
    ///
    /// A crossing that has started always completes; the window is only
    /// checked before boarding opens and again before departing.
    pub fn run(mut self) -> FerryStats {
        let rendezvous = self.ctx.rendezvous.clone();
        let capacity = rendezvous.capacity();
        let crossing = self.ctx.config.crossing_duration();

        self.ctx.emit_ferry(EventKind::ArrivedAtDock);

        let stop_reason = loop {
            if let Some(reason) = self.ctx.stop_reason() {
                break reason;
            }

            self.transition(FerryState::Boarding);
            rendezvous.boarding.post(capacity);
            if rendezvous.departure.wait() == WaitOutcome::Interrupted {
                break StopReason::Interrupted;
            }

            // Loaded but past the window: stay docked rather than start a crossing.
            if let Some(reason) = self.ctx.stop_reason() {
                break reason;
            }

            self.transition(FerryState::Crossing);
            self.ctx.emit_ferry(EventKind::LeftDock);
            thread::sleep(crossing);

            self.transition(FerryState::Unboarding);
            self.ctx.emit_ferry(EventKind::ArrivedAtDock);
            rendezvous.unboarding.post(capacity);
            if rendezvous.empty.wait() == WaitOutcome::Interrupted {
                break StopReason::Interrupted;
            }

            self.cycles_completed = self.cycles_completed.saturating_add(1);
            info!(cycle = self.cycles_completed, "Ferry completed cycle");
        };

        let stopped_in = self.state;
        self.transition(FerryState::Stopped);
        info!(
            cycles = self.cycles_completed,
            reason = ?stop_reason,
            state = ?stopped_in,
            "Ferry stopped"
        );

        FerryStats {
            cycles_completed: self.cycles_completed,
            stopped_in,
            stop_reason,
        }
    }

    fn transition(&mut self, next: FerryState) {
        debug!(from = ?self.state, to = ?next, cycle = self.cycles_completed, "Ferry state change");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::config::SimulationConfig;
    use crate::events::MemoryRecorder;
    use std::sync::Arc;
    use std::time::Duration;

    fn context(capacity: usize) -> (ActorContext, Arc<MemoryRecorder>) {
        let recorder = Arc::new(MemoryRecorder::new());
        let config = SimulationConfig::with_capacity(capacity)
            .with_operating_window(Duration::from_secs(30))
            .with_crossing_duration(Duration::from_millis(10));
        (ActorContext::new(config, recorder.clone()), recorder)
    }

    #[test]
    fn test_ferry_opens_boarding_with_capacity_permits() {
        let (ctx, _recorder) = context(3);
        let rendezvous = ctx.rendezvous.clone();
        let handle = FerryActor::new(ctx).spawn().unwrap();

        // Stand in for the vehicles: take every permit, then fill the ferry.
        for _ in 0..3 {
            assert_eq!(rendezvous.boarding.wait(), WaitOutcome::Acquired);
        }
        assert_eq!(rendezvous.boarding.pending(), 0);
        assert!(rendezvous.departure.post());

        for _ in 0..3 {
            assert_eq!(rendezvous.unboarding.wait(), WaitOutcome::Acquired);
        }

        rendezvous.interrupt_all();
        let stats = handle.join().unwrap();
        assert_eq!(stats.stop_reason, StopReason::Interrupted);
        assert_eq!(stats.stopped_in, FerryState::Unboarding);
        assert_eq!(stats.cycles_completed, 0);
    }

    #[test]
    fn test_ferry_completes_cycle_when_latches_raised() {
        let (ctx, recorder) = context(1);
        let rendezvous = ctx.rendezvous.clone();
        let shutdown = ctx.shutdown.clone();
        let handle = FerryActor::new(ctx).spawn().unwrap();

        assert_eq!(rendezvous.boarding.wait(), WaitOutcome::Acquired);
        rendezvous.departure.post();
        assert_eq!(rendezvous.unboarding.wait(), WaitOutcome::Acquired);
        shutdown.initiate(crate::shutdown::ShutdownSignal::Programmatic);
        rendezvous.empty.post();

        let stats = handle.join().unwrap();
        assert_eq!(stats.cycles_completed, 1);
        assert_eq!(stats.stop_reason, StopReason::ShutdownRequested);

        let kinds: Vec<EventKind> = recorder.snapshot().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::ArrivedAtDock,
                EventKind::LeftDock,
                EventKind::ArrivedAtDock
            ]
        );
    }

    #[test]
    fn test_ferry_stays_docked_when_window_passes_while_boarding() {
        let recorder = Arc::new(MemoryRecorder::new());
        let config = SimulationConfig::with_capacity(1)
            .with_operating_window(Duration::from_millis(50))
            .with_crossing_duration(Duration::from_millis(10));
        let ctx = ActorContext::new(config, recorder.clone());
        let rendezvous = ctx.rendezvous.clone();
        let handle = FerryActor::new(ctx).spawn().unwrap();

        assert_eq!(rendezvous.boarding.wait(), WaitOutcome::Acquired);
        std::thread::sleep(Duration::from_millis(80));
        rendezvous.departure.post();

        let stats = handle.join().unwrap();
        assert_eq!(stats.stop_reason, StopReason::WindowElapsed);
        assert_eq!(stats.stopped_in, FerryState::Boarding);
        assert!(recorder
            .snapshot()
            .iter()
            .all(|e| e.kind != EventKind::LeftDock));
    }

    #[test]
    fn test_ferry_interrupted_while_boarding() {
        let (ctx, _recorder) = context(2);
        let rendezvous = ctx.rendezvous.clone();
        let handle = FerryActor::new(ctx).spawn().unwrap();

        std::thread::sleep(Duration::from_millis(20));
        rendezvous.interrupt_all();

        let stats = handle.join().unwrap();
        assert_eq!(stats.stop_reason, StopReason::Interrupted);
        assert_eq!(stats.stopped_in, FerryState::Boarding);
    }
}
