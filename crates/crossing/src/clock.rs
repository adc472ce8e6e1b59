//! Monotonic simulation clock.

use std::time::{Duration, Instant};

/// Elapsed-time source shared by every actor of one simulation.
///
/// All actors read the same start instant, so deadline checks agree across
/// threads even though each actor reads the clock independently.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    /// Start a clock at the current instant.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time elapsed since the clock started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time in fractional seconds, as stamped on events.
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    /// Whether the operating window has run out.
    #[must_use]
    pub fn is_past(&self, window: Duration) -> bool {
        self.elapsed() >= window
    }

    /// Time left before the window closes, zero once it has passed.
    #[must_use]
    pub fn remaining(&self, window: Duration) -> Duration {
        window.saturating_sub(self.elapsed())
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::start()
    }
}
