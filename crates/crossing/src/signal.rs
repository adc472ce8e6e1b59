//! Counting gates and single-shot latches.
//!
//! Both primitives are a permit count guarded by a mutex with a condition
//! variable for waiters. Neither has a timeout: the only way out of a wait
//! besides a permit is [`Gate::interrupt`] / [`Latch::interrupt`], which the
//! supervisor uses to release actors parked at shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{error, trace};

/// How a blocking wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A permit was consumed.
    Acquired,
    /// The primitive was interrupted; no permit was consumed.
    Interrupted,
}

impl WaitOutcome {
    /// Whether the wait consumed a permit.
    #[must_use]
    pub const fn is_acquired(self) -> bool {
        matches!(self, Self::Acquired)
    }
}

#[derive(Debug, Default)]
struct SignalState {
    permits: usize,
    interrupted: bool,
}

/// Shared permit counter behind both gate and latch.
#[derive(Debug)]
struct Signal {
    name: &'static str,
    state: Mutex<SignalState>,
    available: Condvar,
    posts: AtomicU64,
}

impl Signal {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(SignalState::default()),
            available: Condvar::new(),
            posts: AtomicU64::new(0),
        }
    }

    // Nothing panics while holding this lock, so a poisoned state is still consistent.
    fn lock(&self) -> MutexGuard<'_, SignalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait(&self) -> WaitOutcome {
        let guard = self.lock();
        let mut guard = self
            .available
            .wait_while(guard, |state| state.permits == 0 && !state.interrupted)
            .unwrap_or_else(PoisonError::into_inner);

        if guard.interrupted {
            trace!(signal = self.name, "wait interrupted");
            return WaitOutcome::Interrupted;
        }

        guard.permits = guard.permits.saturating_sub(1);
        WaitOutcome::Acquired
    }

    fn interrupt(&self) {
        let mut guard = self.lock();
        guard.interrupted = true;
        drop(guard);
        self.available.notify_all();
    }

    fn pending(&self) -> usize {
        self.lock().permits
    }

    fn is_interrupted(&self) -> bool {
        self.lock().interrupted
    }

    fn record_posts(&self, count: u64) {
        self.posts.fetch_add(count, Ordering::Relaxed);
    }

    fn posts(&self) -> u64 {
        self.posts.load(Ordering::Relaxed)
    }
}

/// Counting rendezvous signal: every posted permit releases one waiter.
#[derive(Debug)]
pub struct Gate {
    signal: Signal,
}

impl Gate {
    /// Create a closed gate with no permits.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            signal: Signal::new(name),
        }
    }

    /// Release up to `permits` waiters.
    pub fn post(&self, permits: usize) {
        if permits == 0 {
            return;
        }
        let mut guard = self.signal.lock();
        guard.permits = guard.permits.saturating_add(permits);
        drop(guard);

        self.signal
            .record_posts(u64::try_from(permits).unwrap_or(u64::MAX));
        self.signal.available.notify_all();
        trace!(gate = self.signal.name, permits, "gate opened");
    }

    /// Block until a permit is available or the gate is interrupted.
    pub fn wait(&self) -> WaitOutcome {
        self.signal.wait()
    }

    /// Wake every waiter with [`WaitOutcome::Interrupted`], now and from then on.
    pub fn interrupt(&self) {
        self.signal.interrupt();
    }

    /// Permits posted but not yet consumed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.signal.pending()
    }

    /// Whether the gate has been interrupted.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.signal.is_interrupted()
    }

    /// Total permits ever posted.
    #[must_use]
    pub fn posts(&self) -> u64 {
        self.signal.posts()
    }

    /// Name used in diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.signal.name
    }
}

/// Single-shot notification: at most one pending post, consumed by one waiter.
#[derive(Debug)]
pub struct Latch {
    signal: Signal,
}

impl Latch {
    /// Create a cleared latch.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            signal: Signal::new(name),
        }
    }

    /// Raise the latch.
    ///
    /// Returns `false` if the latch was already pending. A second post before
    /// the first is consumed means two threads both saw the threshold, which
    /// the boarding protocol rules out; it is reported rather than coalesced.
    pub fn post(&self) -> bool {
        let mut guard = self.signal.lock();
        if guard.permits > 0 {
            drop(guard);
            self.signal.record_posts(1);
            error!(latch = self.signal.name, "latch posted while already pending");
            return false;
        }
        guard.permits = 1;
        drop(guard);

        self.signal.record_posts(1);
        self.signal.available.notify_one();
        trace!(latch = self.signal.name, "latch raised");
        true
    }

    /// Block until the latch is raised or interrupted, clearing it on success.
    pub fn wait(&self) -> WaitOutcome {
        self.signal.wait()
    }

    /// Wake the waiter with [`WaitOutcome::Interrupted`], now and from then on.
    pub fn interrupt(&self) {
        self.signal.interrupt();
    }

    /// Whether a post is waiting to be consumed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.signal.pending() > 0
    }

    /// Whether the latch has been interrupted.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.signal.is_interrupted()
    }

    /// Total posts, including rejected duplicates.
    #[must_use]
    pub fn posts(&self) -> u64 {
        self.signal.posts()
    }

    /// Name used in diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.signal.name
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_gate_releases_one_waiter_per_permit() {
        let gate = Arc::new(Gate::new("boarding"));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || gate.wait())
            })
            .collect();

        gate.post(3);
        for handle in handles {
            assert_eq!(handle.join().unwrap(), WaitOutcome::Acquired);
        }
        assert_eq!(gate.pending(), 0);
        assert_eq!(gate.posts(), 3);
    }

    #[test]
    fn test_gate_permits_are_not_over_consumed() {
        let gate = Gate::new("boarding");
        gate.post(2);
        assert_eq!(gate.wait(), WaitOutcome::Acquired);
        assert_eq!(gate.wait(), WaitOutcome::Acquired);
        assert_eq!(gate.pending(), 0);
    }

    #[test]
    fn test_gate_post_zero_is_noop() {
        let gate = Gate::new("boarding");
        gate.post(0);
        assert_eq!(gate.posts(), 0);
        assert_eq!(gate.pending(), 0);
    }

    #[test]
    fn test_interrupt_releases_blocked_waiter() {
        let gate = Arc::new(Gate::new("unboarding"));
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.wait())
        };

        thread::sleep(Duration::from_millis(20));
        gate.interrupt();
        assert_eq!(waiter.join().unwrap(), WaitOutcome::Interrupted);
    }

    #[test]
    fn test_interrupt_wins_over_pending_permits() {
        let gate = Gate::new("boarding");
        gate.post(1);
        gate.interrupt();
        assert_eq!(gate.wait(), WaitOutcome::Interrupted);
        assert_eq!(gate.pending(), 1);
        assert_eq!(gate.wait(), WaitOutcome::Interrupted);
    }

    #[test]
    fn test_latch_post_then_wait() {
        let latch = Latch::new("departure");
        assert!(latch.post());
        assert!(latch.is_pending());
        assert_eq!(latch.wait(), WaitOutcome::Acquired);
        assert!(!latch.is_pending());
    }

    #[test]
    fn test_latch_rejects_double_post() {
        let latch = Latch::new("empty");
        assert!(latch.post());
        assert!(!latch.post());
        assert_eq!(latch.posts(), 2);
        assert_eq!(latch.wait(), WaitOutcome::Acquired);
        assert!(!latch.is_pending());
    }

    #[test]
    fn test_latch_wakes_blocked_waiter() {
        let latch = Arc::new(Latch::new("departure"));
        let waiter = {
            let latch = Arc::clone(&latch);
            thread::spawn(move || latch.wait())
        };

        thread::sleep(Duration::from_millis(20));
        assert!(latch.post());
        assert_eq!(waiter.join().unwrap(), WaitOutcome::Acquired);
    }

    #[test]
    fn test_latch_interrupt() {
        let latch = Latch::new("empty");
        latch.interrupt();
        assert!(latch.is_interrupted());
        assert_eq!(latch.wait(), WaitOutcome::Interrupted);
    }
}
