// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod cell;
mod fork;
mod group;
mod join;
mod reduce;

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

pub use cell::FutureStatus;
pub use fork::*;
pub use group::*;
pub use join::*;
pub use reduce::*;

use crate::future::cell::{Forwarder, FutureCell};
use crate::{SharedLatch, TaskError, TaskResult, TaskScheduler, Waitable};

/// A one-shot asynchronous result: either a value, or the error that was
/// captured while computing it.
///
/// Producers call [`set_value`](Self::set_value) /
/// [`set_error`](Self::set_error) (usually indirectly, through
/// [`make_future_result`]); consumers [`wait`](Self::wait) and
/// [`get`](Self::get), or attach a continuation with [`next`](Self::next) /
/// [`fork`](Self::fork), after which the value flows into the successors
/// without ever being stored here.
///
/// Clones share the same cell. Errors short-circuit continuation chains: the
/// attached function is skipped and the tail future carries the error.
#[derive(Debug)]
pub struct FutureResult<T> {
    cell: Arc<FutureCell<T>>,
}

impl<T> Clone for FutureResult<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

/// A weak handle to a [`FutureResult`], for observers that should not keep
/// the result graph alive. Used by long chains where only one step cares
/// about the outcome.
#[derive(Debug)]
pub struct FutureHandle<T> {
    cell: Weak<FutureCell<T>>,
}

impl<T> Clone for FutureHandle<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Weak::clone(&self.cell),
        }
    }
}

impl<T> FutureHandle<T> {
    /// Whether the underlying future result has been destroyed.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.cell.strong_count() == 0
    }

    /// Re-binds to the future result if it is still alive.
    #[must_use]
    pub fn lock(&self) -> Option<FutureResult<T>> {
        self.cell.upgrade().map(|cell| FutureResult { cell })
    }
}

impl<T> FutureResult<T>
where
    T: Send + 'static,
{
    /// Creates an unfulfilled future result bound to `scheduler` (its
    /// continuations will run there).
    #[must_use]
    pub fn new(scheduler: &TaskScheduler) -> Self {
        Self {
            cell: Arc::new(FutureCell::new(scheduler.clone())),
        }
    }

    /// Creates an unfulfilled future result whose waiters block on the
    /// caller-provided `latch`; the cell notifies it once when fulfilled.
    #[must_use]
    pub fn with_latch(scheduler: &TaskScheduler, latch: SharedLatch) -> Self {
        Self {
            cell: Arc::new(FutureCell::with_latch(scheduler.clone(), latch)),
        }
    }

    pub(crate) fn scheduler(&self) -> &TaskScheduler {
        self.cell.scheduler()
    }

    /// Hands out a weak handle to this future result.
    #[must_use]
    pub fn get_handle(&self) -> FutureHandle<T> {
        FutureHandle {
            cell: Arc::downgrade(&self.cell),
        }
    }

    /// Fulfils the future with a value.
    ///
    /// # Panics
    ///
    /// Panics if the future was already fulfilled.
    pub fn set_value(&self, value: T) {
        self.cell.set_result(Ok(value));
    }

    /// Fulfils the future with an error.
    ///
    /// # Panics
    ///
    /// Panics if the future was already fulfilled.
    pub fn set_error(&self, error: TaskError) {
        self.cell.set_result(Err(error));
    }

    /// Runs `func` and fulfils the future with its outcome, converting a
    /// panic into the error state.
    pub fn from_code<F>(&self, func: F)
    where
        F: FnOnce() -> T,
    {
        self.cell.from_code(|| Ok(func()));
    }

    pub(crate) fn from_try_code<F>(&self, func: F)
    where
        F: FnOnce() -> TaskResult<T>,
    {
        self.cell.from_code(func);
    }

    pub(crate) fn install_forwarder(&self, forwarder: Forwarder<T>) {
        self.cell.install_next(forwarder);
    }

    /// Blocks until the future settles. On a pool worker this wait is
    /// re-entrant: the worker keeps executing queued tasks meanwhile.
    pub fn wait(&self) {
        self.cell.wait();
    }

    /// Whether the future has settled, without blocking.
    #[must_use]
    pub fn try_wait(&self) -> bool {
        self.cell.try_wait()
    }

    /// Alias for [`try_wait`](Self::try_wait) that reads better in
    /// conditionals.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.cell.try_wait()
    }

    /// Waits until the future settles or `timeout` elapses. A timeout does
    /// not affect the computation; the caller may wait again.
    #[must_use]
    pub fn wait_for(&self, timeout: Duration) -> FutureStatus {
        self.cell.wait_for(timeout)
    }

    /// Deadline form of [`wait_for`](Self::wait_for).
    #[must_use]
    pub fn wait_until(&self, deadline: Instant) -> FutureStatus {
        self.cell.wait_until(deadline)
    }

    /// Waits for the outcome and takes it out of the cell.
    ///
    /// # Panics
    ///
    /// Panics if the future was continued (the outcome belongs to the
    /// successor) or the outcome was already taken - both are programming
    /// errors.
    #[must_use = "the outcome carries the error state of the task"]
    pub fn get(&self) -> TaskResult<T> {
        self.cell.take_result()
    }

    /// Waits for the outcome and reports whether it is an error, leaving
    /// the outcome in place.
    ///
    /// # Panics
    ///
    /// Panics if the future was continued or the outcome already taken.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.cell.is_failed()
    }

    /// Attaches the continuation `func`, returning the future of its result.
    ///
    /// When this future settles with a value, `func` runs as a scheduler
    /// task; an error skips `func` and poisons the successor directly. If
    /// this future is already settled the forwarding happens immediately.
    ///
    /// # Panics
    ///
    /// Panics if a continuation is already attached.
    pub fn next<F, U>(&self, func: F) -> FutureResult<U>
    where
        F: FnOnce(T) -> U + Send + 'static,
        U: Send + 'static,
    {
        self.next_result(move |value| Ok(func(value)))
    }

    /// [`next`](Self::next) for fallible continuations: `func` returns a
    /// [`TaskResult`], and an `Err` becomes the successor's error state.
    pub fn next_result<F, U>(&self, func: F) -> FutureResult<U>
    where
        F: FnOnce(T) -> TaskResult<U> + Send + 'static,
        U: Send + 'static,
    {
        let successor = FutureResult::<U>::new(self.scheduler());
        let scheduler = self.scheduler().clone();
        let forward_to = successor.clone();

        let forwarder: Forwarder<T> = Box::new(move |result: TaskResult<T>| match result {
            Ok(value) => {
                submit_try_fulfiller(&scheduler, &forward_to, move || func(value));
            }
            Err(error) => forward_to.set_error(error),
        });

        self.cell.install_next(forwarder);
        successor
    }
}

impl<T> Waitable for FutureResult<T>
where
    T: Send + 'static,
{
    fn wait(&self) {
        Self::wait(self);
    }
}

/// Submits `func` to the scheduler and returns the future of its result.
/// The future settles with an error if `func` panics, and is returned
/// already poisoned with [`TaskError::UnableToAddTask`] when the scheduler
/// is not running.
pub fn make_future_result<F, R>(scheduler: &TaskScheduler, func: F) -> FutureResult<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let result = FutureResult::new(scheduler);
    submit_fulfiller(scheduler, &result, func);
    result
}

/// [`make_future_result`] with the future's waiters additionally gated on a
/// caller-provided latch (notified once, when the future settles).
pub fn make_future_result_with_latch<F, R>(
    scheduler: &TaskScheduler,
    latch: SharedLatch,
    func: F,
) -> FutureResult<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let result = FutureResult::with_latch(scheduler, latch);
    submit_fulfiller(scheduler, &result, func);
    result
}

fn submit_fulfiller<F, R>(scheduler: &TaskScheduler, result: &FutureResult<R>, func: F)
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    submit_try_fulfiller(scheduler, result, move || Ok(func()));
}

/// [`make_future_result`] for fallible bodies; an `Err` return becomes the
/// future's error state without going through a panic.
pub(crate) fn make_future_result_from_try<F, R>(
    scheduler: &TaskScheduler,
    func: F,
) -> FutureResult<R>
where
    F: FnOnce() -> TaskResult<R> + Send + 'static,
    R: Send + 'static,
{
    let result = FutureResult::new(scheduler);
    submit_try_fulfiller(scheduler, &result, func);
    result
}

/// Posts `func` as the fulfiller of `cell`. The cell is guaranteed to
/// settle: if the scheduler is stopped, or admits the task and then drops
/// it during shutdown, the cell receives [`TaskError::UnableToAddTask`]
/// instead of leaving its waiters hanging.
pub(crate) fn submit_try_fulfiller<F, R>(scheduler: &TaskScheduler, cell: &FutureResult<R>, func: F)
where
    F: FnOnce() -> TaskResult<R> + Send + 'static,
    R: Send + 'static,
{
    // Fires whenever the fulfiller never got to run - stopped scheduler,
    // rejected submission, or a task destroyed in a queue at shutdown.
    let poison_on_drop = scopeguard::guard(cell.clone(), |cell| {
        if !cell.try_wait() {
            cell.set_error(TaskError::UnableToAddTask);
        }
    });

    _ = scheduler.started()
        && scheduler.add_task(move || {
            // Once the task body runs, `from_code` settles the cell on every
            // path (a panic becomes the error outcome), so the guard can be
            // defused.
            let cell = scopeguard::ScopeGuard::into_inner(poison_on_drop);
            cell.from_try_code(func);
        });
}
