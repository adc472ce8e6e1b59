#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! A recurring rider with a stable identity.

use std::thread::{self, JoinHandle};

use ferry_core::{Error, Result};
use serde::Serialize;
use tracing::{debug, trace};

use crate::actors::{ActorContext, StopReason};
use crate::events::{EventKind, VehicleId};
use crate::signal::WaitOutcome;

/// Vehicle lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VehicleState {
    /// Waiting at the boarding gate.
    Queued,
    /// Counted aboard, waiting at the unboarding gate.
    Aboard,
    /// Off the ferry, driving around before requeueing.
    Roaming,
    /// Out of the loop.
    Stopped,
}

/// What a vehicle thread returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VehicleStats {
    /// Identity, unchanged for the whole run.
    pub id: VehicleId,
    /// Round trips completed (boarded and disembarked).
    pub trips: u64,
    /// State the vehicle was in when it stopped.
    pub stopped_in: VehicleState,
    /// Why it stopped.
    pub stop_reason: StopReason,
}

/// One vehicle of the fixed pool.
#[derive(Debug)]
pub struct VehicleActor {
    id: VehicleId,
    ctx: ActorContext,
    state: VehicleState,
    trips: u64,
}

impl VehicleActor {
    /// Create a vehicle about to join the queue.
    #[must_use]
    pub const fn new(id: VehicleId, ctx: ActorContext) -> Self {
        Self {
            id,
            ctx,
            state: VehicleState::Roaming,
            trips: 0,
        }
    }

    /// Run the vehicle on its own thread.
    ///
    /// # Errors
    ///
    /// Returns `Error::InitializationFailed` if the thread cannot be spawned.
    pub fn spawn(self) -> Result<JoinHandle<VehicleStats>> {
        let id = self.id;
        thread::Builder::new()
            .name(format!("vehicle-{id}"))
            .spawn(move || self.run())
            .map_err(|e| Error::initialization_failed(format!("vehicle {id} thread"), e.to_string()))
    }

    /// Queue, board, ride, disembark, roam, until the window closes or the
    /// rendezvous is interrupted.
    pub fn run(mut self) -> VehicleStats {
        let rendezvous = self.ctx.rendezvous.clone();
        let config = self.ctx.config.clone();
        let mut rng = rand::thread_rng();

        let stop_reason = loop {
            if let Some(reason) = self.ctx.stop_reason() {
                break reason;
            }

            self.transition(VehicleState::Queued);
            if rendezvous.boarding.wait() == WaitOutcome::Interrupted {
                break StopReason::Interrupted;
            }

            let hold = config.boarding_jitter.sample(&mut rng);
            let ctx = &self.ctx;
            let id = self.id;
            rendezvous.occupancy.board(hold, |transition| {
                ctx.emit_vehicle(id, EventKind::Boarded);
                if transition.threshold_reached {
                    debug!(vehicle = %id, "Ferry full, signalling departure");
                    rendezvous.departure.post();
                }
            });

            self.transition(VehicleState::Aboard);
            if rendezvous.unboarding.wait() == WaitOutcome::Interrupted {
                break StopReason::Interrupted;
            }

            thread::sleep(config.unboarding_jitter.sample(&mut rng));
            self.ctx.emit_vehicle(self.id, EventKind::Disembarked);
            rendezvous.occupancy.disembark(|transition| {
                if transition.threshold_reached {
                    debug!(vehicle = %id, "Ferry empty, signalling ferry");
                    rendezvous.empty.post();
                }
            });
            self.trips = self.trips.saturating_add(1);

            self.transition(VehicleState::Roaming);
            thread::sleep(config.roam.sample(&mut rng));
        };

        let stopped_in = self.state;
        self.transition(VehicleState::Stopped);
        debug!(
            vehicle = %self.id,
            trips = self.trips,
            reason = ?stop_reason,
            state = ?stopped_in,
            "Vehicle stopped"
        );

        VehicleStats {
            id: self.id,
            trips: self.trips,
            stopped_in,
            stop_reason,
        }
    }

    fn transition(&mut self, next: VehicleState) {
        trace!(vehicle = %self.id, from = ?self.state, to = ?next, "Vehicle state change");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::config::{JitterRange, SimulationConfig};
    use crate::events::MemoryRecorder;
    use std::sync::Arc;
    use std::time::Duration;

    fn quick_config(capacity: usize) -> SimulationConfig {
        SimulationConfig::with_capacity(capacity)
            .with_operating_window(Duration::from_secs(30))
            .with_boarding_jitter(JitterRange::from_millis(1, 3))
            .with_unboarding_jitter(JitterRange::from_millis(1, 3))
            .with_roam(JitterRange::from_millis(5, 10))
    }

    #[test]
    fn test_last_boarder_raises_departure_latch() {
        let recorder = Arc::new(MemoryRecorder::new());
        let ctx = ActorContext::new(quick_config(2), recorder.clone());
        let rendezvous = ctx.rendezvous.clone();

        let handles: Vec<_> = VehicleId::pool(2)
            .map(|id| VehicleActor::new(id, ctx.clone()).spawn().unwrap())
            .collect();

        rendezvous.boarding.post(2);
        assert_eq!(rendezvous.departure.wait(), WaitOutcome::Acquired);
        assert_eq!(rendezvous.occupancy.current(), 2);
        assert_eq!(rendezvous.departure.posts(), 1);

        rendezvous.unboarding.post(2);
        assert_eq!(rendezvous.empty.wait(), WaitOutcome::Acquired);
        assert_eq!(rendezvous.occupancy.current(), 0);
        assert_eq!(rendezvous.empty.posts(), 1);

        rendezvous.interrupt_all();
        for handle in handles {
            let stats = handle.join().unwrap();
            assert_eq!(stats.trips, 1);
            assert_eq!(stats.stop_reason, StopReason::Interrupted);
        }

        let boarded = recorder
            .snapshot()
            .iter()
            .filter(|e| e.kind == EventKind::Boarded)
            .count();
        assert_eq!(boarded, 2);
    }

    #[test]
    fn test_vehicle_waits_for_boarding_permit() {
        let recorder = Arc::new(MemoryRecorder::new());
        let ctx = ActorContext::new(quick_config(1), recorder.clone());
        let rendezvous = ctx.rendezvous.clone();
        let handle = VehicleActor::new(VehicleId::new(1), ctx).spawn().unwrap();

        std::thread::sleep(Duration::from_millis(30));
        assert!(recorder.is_empty());
        assert_eq!(rendezvous.occupancy.current(), 0);

        rendezvous.interrupt_all();
        let stats = handle.join().unwrap();
        assert_eq!(stats.stopped_in, VehicleState::Queued);
        assert_eq!(stats.trips, 0);
    }

    #[test]
    fn test_vehicle_stops_at_loop_boundary_after_shutdown() {
        let recorder = Arc::new(MemoryRecorder::new());
        let ctx = ActorContext::new(quick_config(1), recorder);
        let rendezvous = ctx.rendezvous.clone();
        let shutdown = ctx.shutdown.clone();
        let handle = VehicleActor::new(VehicleId::new(1), ctx).spawn().unwrap();

        rendezvous.boarding.post(1);
        assert_eq!(rendezvous.departure.wait(), WaitOutcome::Acquired);
        shutdown.initiate(crate::shutdown::ShutdownSignal::Programmatic);
        rendezvous.unboarding.post(1);
        assert_eq!(rendezvous.empty.wait(), WaitOutcome::Acquired);

        let stats = handle.join().unwrap();
        assert_eq!(stats.trips, 1);
        assert_eq!(stats.stop_reason, StopReason::ShutdownRequested);
        assert_eq!(stats.stopped_in, VehicleState::Roaming);
    }
}
