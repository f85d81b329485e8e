// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Weak;

use crate::scheduler::SchedulerCore;
use crate::scheduler::scheduler_core::temp_runner_loop;
use crate::{InterruptibleThread, SharedLatch};

/// A short-lived thread enlisted while a caller is blocked inside
/// [`crate::TaskScheduler::wait_for_scope`], so that the blocked capacity is
/// replaced instead of lost.
///
/// The runner executes the normal worker loop, with one extra exit
/// condition: a latch the sponsoring wait notifies when it finishes.
/// Dropping the runner notifies that latch and joins the thread, so the
/// compensation never outlives the wait that needed it.
#[derive(Debug)]
pub(crate) struct TempTaskRunner {
    sem: SharedLatch,
    _thread: InterruptibleThread,
}

impl TempTaskRunner {
    pub(crate) fn start(core: Weak<SchedulerCore>, id: usize) -> Self {
        let sem = SharedLatch::new();
        let runner_sem = sem.clone();
        let thread = InterruptibleThread::spawn(format!("treadle-temp-runner-{id}"), move |token| {
            temp_runner_loop(&core, id, &token, &runner_sem);
        });
        Self {
            sem,
            _thread: thread,
        }
    }
}

impl Drop for TempTaskRunner {
    #[cfg_attr(test, mutants::skip)] // Omitting the notify is invisible short of a shutdown hang.
    fn drop(&mut self) {
        // Wake the runner out of any blocking pop; the thread itself is
        // joined by its own destructor right after this.
        self.sem.notify();
    }
}
