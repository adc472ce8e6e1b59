//! The coordination object shared by the ferry and its vehicles.

use tracing::debug;

use crate::occupancy::OccupancyCounter;
use crate::signal::{Gate, Latch};

/// The four signals and the occupancy counter for one ferry.
///
/// The ferry posts to the gates and waits on the latches; vehicles wait on
/// the gates and post the latches from inside the counter's critical
/// section. Nothing else is shared between actors.
#[derive(Debug)]
pub struct Rendezvous {
    capacity: usize,
    /// Released by the ferry, one permit per vehicle slot.
    pub boarding: Gate,
    /// Raised by the vehicle that fills the ferry.
    pub departure: Latch,
    /// Released by the ferry once across.
    pub unboarding: Gate,
    /// Raised by the vehicle that empties the ferry.
    pub empty: Latch,
    /// Vehicles aboard.
    pub occupancy: OccupancyCounter,
}

impl Rendezvous {
    /// Create the primitives for a ferry of `capacity`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            boarding: Gate::new("boarding"),
            departure: Latch::new("departure"),
            unboarding: Gate::new("unboarding"),
            empty: Latch::new("empty"),
            occupancy: OccupancyCounter::new(capacity),
        }
    }

    /// Ferry capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Release every actor parked on any signal, now and for all later waits.
    pub fn interrupt_all(&self) {
        self.boarding.interrupt();
        self.departure.interrupt();
        self.unboarding.interrupt();
        self.empty.interrupt();
        debug!(
            gates = ?[self.boarding.name(), self.unboarding.name()],
            latches = ?[self.departure.name(), self.empty.name()],
            occupancy = self.occupancy.current(),
            "Rendezvous interrupted"
        );
    }

    /// Permits and latches left unconsumed, by signal name.
    #[must_use]
    pub fn leftovers(&self) -> Vec<(&'static str, usize)> {
        vec![
            (self.boarding.name(), self.boarding.pending()),
            (self.departure.name(), usize::from(self.departure.is_pending())),
            (self.unboarding.name(), self.unboarding.pending()),
            (self.empty.name(), usize::from(self.empty.is_pending())),
        ]
    }

    /// Whether [`Rendezvous::interrupt_all`] has run.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.boarding.is_interrupted()
            && self.departure.is_interrupted()
            && self.unboarding.is_interrupted()
            && self.empty.is_interrupted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::WaitOutcome;

    #[test]
    fn test_new_rendezvous_is_idle() {
        let rendezvous = Rendezvous::new(5);
        assert_eq!(rendezvous.capacity(), 5);
        assert_eq!(rendezvous.occupancy.current(), 0);
        assert_eq!(rendezvous.boarding.pending(), 0);
        assert!(!rendezvous.departure.is_pending());
        assert!(!rendezvous.is_interrupted());
        assert!(rendezvous.leftovers().iter().all(|(_, left)| *left == 0));
    }

    #[test]
    fn test_leftovers_name_each_signal() {
        let rendezvous = Rendezvous::new(3);
        rendezvous.boarding.post(3);
        rendezvous.empty.post();
        assert_eq!(
            rendezvous.leftovers(),
            vec![("boarding", 3), ("departure", 0), ("unboarding", 0), ("empty", 1)]
        );
    }

    #[test]
    fn test_interrupt_all_releases_every_signal() {
        let rendezvous = Rendezvous::new(2);
        rendezvous.interrupt_all();
        assert!(rendezvous.is_interrupted());
        assert_eq!(rendezvous.boarding.wait(), WaitOutcome::Interrupted);
        assert_eq!(rendezvous.departure.wait(), WaitOutcome::Interrupted);
        assert_eq!(rendezvous.unboarding.wait(), WaitOutcome::Interrupted);
        assert_eq!(rendezvous.empty.wait(), WaitOutcome::Interrupted);
    }
}
