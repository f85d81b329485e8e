// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::Backoff;

/// Outcome of a timed wait on a [`Latch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// The counter reached zero before the deadline.
    Completed,
    /// The deadline passed first. The computation behind the latch is
    /// unaffected; the caller may wait again.
    TimedOut,
}

/// A count-down latch: a counter that tasks decrement as they complete and
/// waiters block on until it reaches zero.
///
/// Unlike `std::sync::Barrier` the counter can be topped up while in use
/// ([`Latch::add_notifier`]) and re-armed after it has been consumed
/// ([`Latch::reset`]), which is what lets one latch gate a whole group of
/// tasks submitted incrementally.
#[derive(Debug)]
pub struct Latch {
    count: AtomicIsize,
    // The mutex carries no data; it only serializes the notify/wait handoff
    // so a waiter cannot miss the final wakeup.
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl Latch {
    /// Creates a latch that waits for a single notification.
    #[must_use]
    pub fn new() -> Self {
        Self::with_count(1)
    }

    /// Creates a latch that waits for `count` notifications.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero.
    #[must_use]
    pub fn with_count(count: usize) -> Self {
        assert!(count > 0, "latch count must be positive");
        Self {
            count: AtomicIsize::new(isize::try_from(count).expect("latch count out of range")),
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    /// Registers one more notification the latch should wait for. Must not
    /// race with the counter reaching zero.
    pub fn add_notifier(&self) {
        _ = self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrements the counter, waking all waiters when it reaches zero.
    /// Tolerates surplus notifications (the counter goes negative and
    /// waiters stay released).
    pub fn notify(&self) {
        let previous = self.count.fetch_sub(1, Ordering::AcqRel);
        if previous <= 1 {
            // Taking the lock orders this wakeup after any waiter that has
            // checked the counter but not yet parked.
            drop(self.mutex.lock());
            self.condvar.notify_all();
        }
    }

    /// Blocks until the counter reaches zero.
    pub fn wait(&self) {
        if self.try_wait() {
            return;
        }
        let mut guard = self.mutex.lock();
        while self.count.load(Ordering::Acquire) > 0 {
            self.condvar.wait(&mut guard);
        }
    }

    /// Returns `true` when the counter has reached zero, without blocking.
    #[must_use]
    pub fn try_wait(&self) -> bool {
        self.count.load(Ordering::Acquire) <= 0
    }

    /// Waits until the counter reaches zero or `timeout` elapses.
    #[must_use]
    pub fn wait_for(&self, timeout: Duration) -> WaitStatus {
        self.wait_until(Instant::now() + timeout)
    }

    /// Waits until the counter reaches zero or `deadline` passes. Polls with
    /// the shared backoff ladder so timed waiters compete fairly with the
    /// queue helpers.
    #[must_use]
    pub fn wait_until(&self, deadline: Instant) -> WaitStatus {
        let backoff = Backoff::new();
        loop {
            if self.try_wait() {
                return WaitStatus::Completed;
            }
            if Instant::now() >= deadline {
                return WaitStatus::TimedOut;
            }
            backoff.snooze();
        }
    }

    /// Re-arms the latch to wait for `count` notifications. Must only be
    /// called while no waiter is blocked on the latch.
    pub fn reset(&self, count: usize) {
        self.count.store(
            isize::try_from(count).expect("latch count out of range"),
            Ordering::Release,
        );
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

/// A reference-counted handle to a [`Latch`], so producers and consumers can
/// each keep one side of the same counter.
#[derive(Debug, Clone)]
pub struct SharedLatch {
    inner: Arc<Latch>,
}

impl SharedLatch {
    /// Creates a shared latch that waits for a single notification.
    #[must_use]
    pub fn new() -> Self {
        Self::with_count(1)
    }

    /// Creates a shared latch that waits for `count` notifications.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero.
    #[must_use]
    pub fn with_count(count: usize) -> Self {
        Self {
            inner: Arc::new(Latch::with_count(count)),
        }
    }

    /// See [`Latch::add_notifier`].
    pub fn add_notifier(&self) {
        self.inner.add_notifier();
    }

    /// See [`Latch::notify`].
    pub fn notify(&self) {
        self.inner.notify();
    }

    /// See [`Latch::wait`].
    pub fn wait(&self) {
        self.inner.wait();
    }

    /// See [`Latch::try_wait`].
    #[must_use]
    pub fn try_wait(&self) -> bool {
        self.inner.try_wait()
    }

    /// See [`Latch::wait_for`].
    #[must_use]
    pub fn wait_for(&self, timeout: Duration) -> WaitStatus {
        self.inner.wait_for(timeout)
    }

    /// See [`Latch::wait_until`].
    #[must_use]
    pub fn wait_until(&self, deadline: Instant) -> WaitStatus {
        self.inner.wait_until(deadline)
    }

    /// See [`Latch::reset`].
    pub fn reset(&self, count: usize) {
        self.inner.reset(count);
    }
}

impl Default for SharedLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything a scheduler can block on through its re-entrant wait
/// ([`crate::TaskScheduler::wait_for`]).
pub trait Waitable {
    /// Blocks until the waitable completes.
    fn wait(&self);
}

impl Waitable for Latch {
    fn wait(&self) {
        Self::wait(self);
    }
}

impl Waitable for SharedLatch {
    fn wait(&self) {
        Self::wait(self);
    }
}
