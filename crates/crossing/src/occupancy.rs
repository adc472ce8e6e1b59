//! Mutex-guarded count of vehicles aboard.
//!
//! The count is the only mutable state shared between vehicles. Every change
//! and the threshold test that follows it happen under one lock acquisition,
//! and the caller's closure runs before the lock is released, so exactly one
//! vehicle per phase observes the count hitting capacity (or zero).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::error;

/// Result of one increment or decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Count after the change.
    pub occupancy: usize,
    /// This change moved the count onto the phase threshold
    /// (capacity when boarding, zero when disembarking).
    pub threshold_reached: bool,
}

/// Vehicles currently aboard, bounded by capacity.
#[derive(Debug)]
pub struct OccupancyCounter {
    capacity: usize,
    aboard: Mutex<usize>,
    high_water: AtomicUsize,
}

impl OccupancyCounter {
    /// Create an empty counter.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        Self {
            capacity,
            aboard: Mutex::new(0),
            high_water: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.aboard.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count one vehicle aboard.
    ///
    /// `hold` is slept while holding the lock before the increment, which
    /// staggers simultaneous boarders. `within` runs inside the critical
    /// section with the resulting transition.
    pub fn board<F>(&self, hold: Duration, within: F) -> Transition
    where
        F: FnOnce(Transition),
    {
        let mut aboard = self.lock();
        if !hold.is_zero() {
            thread::sleep(hold);
        }

        let transition = match aboard.checked_add(1).filter(|next| *next <= self.capacity) {
            Some(next) => {
                *aboard = next;
                self.high_water.fetch_max(next, Ordering::Relaxed);
                Transition {
                    occupancy: next,
                    threshold_reached: next == self.capacity,
                }
            }
            None => {
                error!(
                    occupancy = *aboard,
                    capacity = self.capacity,
                    "boarding past capacity refused"
                );
                Transition {
                    occupancy: *aboard,
                    threshold_reached: false,
                }
            }
        };

        within(transition);
        transition
    }

    /// Count one vehicle off. `within` runs inside the critical section.
    pub fn disembark<F>(&self, within: F) -> Transition
    where
        F: FnOnce(Transition),
    {
        let mut aboard = self.lock();

        let transition = match aboard.checked_sub(1) {
            Some(next) => {
                *aboard = next;
                Transition {
                    occupancy: next,
                    threshold_reached: next == 0,
                }
            }
            None => {
                error!("disembarking from an empty ferry refused");
                Transition {
                    occupancy: 0,
                    threshold_reached: false,
                }
            }
        };

        within(transition);
        transition
    }

    /// Current count.
    #[must_use]
    pub fn current(&self) -> usize {
        *self.lock()
    }

    /// Highest count ever observed.
    #[must_use]
    pub fn high_water_mark(&self) -> usize {
        self.high_water.load(Ordering::Relaxed)
    }

    /// Capacity bound.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
