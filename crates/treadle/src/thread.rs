// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::process;
use std::thread::{self, JoinHandle, ThreadId};

use tracing::{error, warn};

use crate::SharedLatch;

/// Read side of a cooperative stop request, handed to every thread body.
/// Cancellation is checked between tasks, never within one.
#[derive(Debug, Clone)]
pub(crate) struct StopToken {
    latch: SharedLatch,
}

impl StopToken {
    /// `true` until a stop has been requested.
    pub(crate) fn can_continue(&self) -> bool {
        !self.latch.try_wait()
    }
}

/// An OS thread bound to a stop token.
///
/// Dropping the thread requests a stop and joins, unless the thread has been
/// [`detach`](Self::detach)ed first. Joining a worker from itself would
/// deadlock, so schedulers only drop these from outside the pool.
#[derive(Debug)]
pub(crate) struct InterruptibleThread {
    stop_latch: SharedLatch,
    handle: Option<JoinHandle<()>>,
}

impl InterruptibleThread {
    /// Spawns a named thread running `body` with a fresh stop token.
    ///
    /// Failure to create an OS thread leaves the scheduler unable to honor
    /// its sizing contract, so it is treated as fatal.
    pub(crate) fn spawn<F>(name: String, body: F) -> Self
    where
        F: FnOnce(StopToken) + Send + 'static,
    {
        let stop_latch = SharedLatch::new();
        let token = StopToken {
            latch: stop_latch.clone(),
        };

        let handle = match thread::Builder::new()
            .name(name)
            .spawn(move || body(token))
        {
            Ok(handle) => handle,
            Err(source) => {
                error!(error = %source, "failed to create a worker thread, aborting");
                process::abort();
            }
        };

        Self {
            stop_latch,
            handle: Some(handle),
        }
    }

    pub(crate) fn thread_id(&self) -> Option<ThreadId> {
        self.handle.as_ref().map(|handle| handle.thread().id())
    }

    /// Requests a cooperative stop. The thread observes it at its next token
    /// check.
    pub(crate) fn stop(&self) {
        if !self.stop_latch.try_wait() {
            self.stop_latch.notify();
        }
    }

    /// Waits for the thread to exit. No-op if already joined or detached.
    pub(crate) fn join(&mut self) {
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            // Worker bodies catch panics around every task, so reaching this
            // means the loop itself failed.
            warn!("worker thread terminated by panic");
        }
    }

    /// Lets the thread run to completion on its own; the destructor will no
    /// longer wait for it.
    pub(crate) fn detach(&mut self) {
        drop(self.handle.take());
    }
}

impl Drop for InterruptibleThread {
    #[cfg_attr(test, mutants::skip)] // Omitting the join is invisible short of a shutdown hang.
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use treadle_testing::execute_or_abandon;

    use super::*;

    #[test]
    fn stop_is_observed_by_the_body() {
        let stopped = Arc::new(AtomicBool::new(false));

        let mut thread = InterruptibleThread::spawn("test-stoppable".to_string(), {
            let stopped = Arc::clone(&stopped);
            move |token| {
                while token.can_continue() {
                    thread::yield_now();
                }
                stopped.store(true, Ordering::Release);
            }
        });

        thread.stop();
        execute_or_abandon(move || thread.join()).expect("thread did not stop in time");
        assert!(stopped.load(Ordering::Acquire));
    }

    #[test]
    fn drop_stops_and_joins() {
        let finished = Arc::new(AtomicBool::new(false));

        let thread = InterruptibleThread::spawn("test-dropped".to_string(), {
            let finished = Arc::clone(&finished);
            move |token| {
                while token.can_continue() {
                    thread::yield_now();
                }
                finished.store(true, Ordering::Release);
            }
        });

        execute_or_abandon(move || drop(thread)).expect("drop did not join in time");
        assert!(finished.load(Ordering::Acquire));
    }

    #[test]
    fn detached_threads_are_not_joined() {
        let mut thread = InterruptibleThread::spawn("test-detached".to_string(), |token| {
            while token.can_continue() {
                thread::yield_now();
            }
        });

        thread.stop();
        thread.detach();
        // Dropping after detach must not block on the thread.
        drop(thread);
    }
}
