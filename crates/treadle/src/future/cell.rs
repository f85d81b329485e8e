// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::{SharedLatch, TaskError, TaskResult, TaskScheduler, WaitStatus};

/// Where a future-result cell is in its life, and what a timed wait on it
/// observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureStatus {
    /// No result yet and no continuation installed.
    Pending,
    /// A result is stored and waiters have been released.
    Ready,
    /// A continuation owns the outcome; the cell itself will never hold a
    /// value. Reading from a continued cell is a programming error.
    Continued,
    /// Returned by timed waits only: the deadline passed before the cell
    /// settled. The computation is unaffected.
    TimedOut,
}

/// A continuation as stored in a cell: consumes the result that would
/// otherwise have been stored.
pub(crate) type Forwarder<T> = Box<dyn FnOnce(TaskResult<T>) + Send>;

struct CellState<T> {
    status: FutureStatus,
    result: Option<TaskResult<T>>,
    next: Option<Forwarder<T>>,
}

/// The shared interior of a [`crate::FutureResult`]: a one-shot
/// value-or-error slot, an optional forwarding continuation, a latch for
/// waiters and the scheduler used to run continuations.
///
/// All transitions happen under one lock; the installed forwarder is always
/// invoked *after* the lock is released so that a forwarder which re-enters
/// the cell graph cannot deadlock. The lock makes the
/// `Pending -> Continued` transition atomic: a concurrent waiter either sees
/// `Pending` (and parks on the latch) or `Continued` - never a transient
/// `Ready` that later disappears.
pub(crate) struct FutureCell<T> {
    state: Mutex<CellState<T>>,
    latch: SharedLatch,
    scheduler: TaskScheduler,
}

impl<T> FutureCell<T>
where
    T: Send + 'static,
{
    pub(crate) fn new(scheduler: TaskScheduler) -> Self {
        Self::with_latch(scheduler, SharedLatch::new())
    }

    /// A cell whose waiters block on a caller-provided latch. The cell
    /// notifies it exactly once, on the transition out of `Pending`.
    pub(crate) fn with_latch(scheduler: TaskScheduler, latch: SharedLatch) -> Self {
        Self {
            state: Mutex::new(CellState {
                status: FutureStatus::Pending,
                result: None,
                next: None,
            }),
            latch,
            scheduler,
        }
    }

    pub(crate) fn scheduler(&self) -> &TaskScheduler {
        &self.scheduler
    }

    /// Delivers the outcome. With a continuation installed the outcome is
    /// handed to it directly and never stored; otherwise it is stored and
    /// waiters are released.
    ///
    /// # Panics
    ///
    /// Panics if an outcome was already delivered - the cell is one-shot.
    pub(crate) fn set_result(&self, result: TaskResult<T>) {
        enum Delivery<T> {
            Stored,
            Forward(Forwarder<T>, TaskResult<T>),
        }

        let delivery = {
            let mut state = self.state.lock();
            match state.status {
                FutureStatus::Pending => {
                    state.result = Some(result);
                    state.status = FutureStatus::Ready;
                    Delivery::Stored
                }
                FutureStatus::Continued => {
                    let forwarder = state
                        .next
                        .take()
                        .unwrap_or_else(|| panic!("future result set more than once"));
                    Delivery::Forward(forwarder, result)
                }
                FutureStatus::Ready => panic!("future result set more than once"),
                FutureStatus::TimedOut => {
                    unreachable!("cell state is never recorded as TimedOut")
                }
            }
        };

        match delivery {
            Delivery::Stored => self.latch.notify(),
            // Invoked outside the lock; the forwarder typically posts a task
            // or fills a successor cell.
            Delivery::Forward(forwarder, result) => forwarder(result),
        }
    }

    /// Installs `forwarder` as the cell's single continuation.
    ///
    /// From `Pending` the cell transitions to `Continued` and waiters are
    /// released (they observe the continued state, not a value). From
    /// `Ready` the stored outcome is handed to the forwarder immediately on
    /// the calling thread.
    ///
    /// # Panics
    ///
    /// Panics if a continuation was already installed.
    pub(crate) fn install_next(&self, forwarder: Forwarder<T>) {
        let ready_result = {
            let mut state = self.state.lock();
            match state.status {
                FutureStatus::Pending => {
                    state.next = Some(forwarder);
                    state.status = FutureStatus::Continued;
                    None
                }
                FutureStatus::Ready => {
                    let result = state
                        .result
                        .take()
                        .unwrap_or_else(|| panic!("future value already taken"));
                    state.status = FutureStatus::Continued;
                    Some((forwarder, result))
                }
                FutureStatus::Continued => {
                    panic!("a continuation may only be installed once")
                }
                FutureStatus::TimedOut => {
                    unreachable!("cell state is never recorded as TimedOut")
                }
            }
        };

        match ready_result {
            Some((forwarder, result)) => forwarder(result),
            // Release waiters; they observe `Continued` and must not read.
            None => self.latch.notify(),
        }
    }

    /// Runs `func`, capturing a panic as the error outcome, and delivers
    /// whatever it produces.
    pub(crate) fn from_code<F>(&self, func: F)
    where
        F: FnOnce() -> TaskResult<T>,
    {
        let outcome = match catch_unwind(AssertUnwindSafe(func)) {
            Ok(result) => result,
            Err(payload) => Err(TaskError::from_panic(payload.as_ref())),
        };
        self.set_result(outcome);
    }

    /// Blocks until the cell leaves `Pending`. On a pool worker the wait is
    /// re-entrant: the worker keeps executing tasks while it waits.
    pub(crate) fn wait(&self) {
        if self.latch.try_wait() {
            return;
        }
        if self.scheduler.is_worker_thread() {
            self.scheduler.wait_for_scope(|| self.latch.wait());
        } else {
            self.latch.wait();
        }
    }

    pub(crate) fn try_wait(&self) -> bool {
        self.latch.try_wait()
    }

    pub(crate) fn wait_for(&self, timeout: Duration) -> FutureStatus {
        self.wait_until(Instant::now() + timeout)
    }

    pub(crate) fn wait_until(&self, deadline: Instant) -> FutureStatus {
        match self.latch.wait_until(deadline) {
            WaitStatus::Completed => self.status(),
            WaitStatus::TimedOut => FutureStatus::TimedOut,
        }
    }

    pub(crate) fn status(&self) -> FutureStatus {
        self.state.lock().status
    }

    /// Takes the outcome out of the cell, waiting for it first.
    ///
    /// # Panics
    ///
    /// Panics if the cell was continued (the value went to the successor)
    /// or the outcome was already taken.
    pub(crate) fn take_result(&self) -> TaskResult<T> {
        self.wait();
        let mut state = self.state.lock();
        match state.status {
            FutureStatus::Continued => {
                panic!("attempt to use a future result that has been continued")
            }
            _ => state
                .result
                .take()
                .unwrap_or_else(|| panic!("future value already taken")),
        }
    }

    /// Whether the settled outcome is an error, without consuming it.
    ///
    /// # Panics
    ///
    /// Panics if the cell was continued or the outcome already taken.
    pub(crate) fn is_failed(&self) -> bool {
        self.wait();
        let state = self.state.lock();
        match state.status {
            FutureStatus::Continued => {
                panic!("attempt to use a future result that has been continued")
            }
            _ => state
                .result
                .as_ref()
                .unwrap_or_else(|| panic!("future value already taken"))
                .is_err(),
        }
    }
}

impl<T> std::fmt::Debug for FutureCell<T> {
    #[cfg_attr(test, mutants::skip)] // We have no contract to test here - can return anything.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FutureCell")
            .field("status", &self.state.lock().status)
            .finish_non_exhaustive()
    }
}
