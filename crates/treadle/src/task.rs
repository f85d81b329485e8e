// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;

use crate::SharedLatch;

/// A unit of work queued on the scheduler: a type-erased callable plus an
/// optional latch that interested parties wait on.
///
/// Move-only by construction (executing consumes the task). The latch is
/// notified exactly once per task no matter how the task ends:
///
/// * when the task body finishes (normally or by panic), the scheduler's
///   task wrapper notifies it, and
/// * when a never-executed task is destroyed - queues drained at shutdown
///   drop their tasks - [`Drop`] notifies it so waiters are released.
pub struct Task {
    func: Option<Box<dyn FnOnce() + Send>>,
    latch: Option<SharedLatch>,
}

impl Task {
    /// Creates a task with no completion latch.
    pub fn new<F>(func: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            func: Some(Box::new(func)),
            latch: None,
        }
    }

    /// Creates a task whose completion interested parties observe through
    /// `latch`.
    pub fn with_latch<F>(func: F, latch: SharedLatch) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            func: Some(Box::new(func)),
            latch: Some(latch),
        }
    }

    /// Invokes the callable. Consumes the task; the callable runs at most
    /// once.
    pub fn execute(mut self) {
        if let Some(func) = self.func.take() {
            func();
        }
    }

    /// Returns `true` when the task's latch has already been satisfied, in
    /// which case running the task would be pointless and the scheduler
    /// treats it as a no-op.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.latch.as_ref().is_some_and(SharedLatch::try_wait)
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        // Executed tasks have had their callable taken; their latch was
        // notified by whoever ran them.
        if let Some(func) = self.func.take() {
            // Destroy the callable first: anything it captured (such as a
            // cell-settling guard) must resolve before waiters are released
            // through the latch.
            drop(func);
            if let Some(latch) = self.latch.take() {
                latch.notify();
            }
        }
    }
}

impl fmt::Debug for Task {
    #[cfg_attr(test, mutants::skip)] // We have no contract to test here - can return anything.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("executed", &self.func.is_none())
            .field("has_latch", &self.latch.is_some())
            .finish()
    }
}
