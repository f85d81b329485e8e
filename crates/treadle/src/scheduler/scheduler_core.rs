// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    InterruptibleThread, PushResult, SharedLatch, StopToken, Task, TaskQueue, pop_front, push_back,
};

/// The fixed-width pool behind a [`crate::TaskScheduler`]: one bounded queue
/// per worker, the workers themselves, and the atomics that route
/// submissions.
///
/// Construction builds the queues only; [`start`](Self::start) brings up the
/// workers. The queue count never changes over the scheduler's lifetime.
///
/// # Ownership
///
/// The facade holds the only long-lived `Arc` to this type. Workers and task
/// wrappers capture `Weak` references and upgrade per iteration, so a pool
/// whose facade has gone away winds down instead of keeping itself alive.
pub(crate) struct SchedulerCore {
    queues: Box<[TaskQueue]>,
    num_threads: usize,
    block_on_shutdown: bool,
    threads: Mutex<Vec<InterruptibleThread>>,
    thread_map: Mutex<HashMap<ThreadId, usize>>,
    /// Round-robin dispenser for home-queue selection.
    task_count: AtomicUsize,
    /// Dispenser for temp-runner identities.
    current_id: AtomicUsize,
    running: AtomicBool,
}

impl SchedulerCore {
    pub(crate) fn new(num_threads: usize, block_on_shutdown: bool) -> Self {
        assert!(num_threads > 0, "scheduler needs at least one worker");
        Self {
            queues: (0..num_threads).map(|_| TaskQueue::new()).collect(),
            num_threads,
            block_on_shutdown,
            threads: Mutex::new(Vec::new()),
            thread_map: Mutex::new(HashMap::new()),
            task_count: AtomicUsize::new(0),
            current_id: AtomicUsize::new(0),
            running: AtomicBool::new(false),
        }
    }

    pub(crate) fn started(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn size(&self) -> usize {
        self.num_threads
    }

    pub(crate) fn block_on_shutdown(&self) -> bool {
        self.block_on_shutdown
    }

    pub(crate) fn has_empty_queue(&self) -> bool {
        self.queues.iter().any(TaskQueue::is_empty)
    }

    /// Whether the calling thread is one of this pool's workers. Temp
    /// runners are deliberately not in the map.
    pub(crate) fn is_worker_thread(&self) -> bool {
        self.thread_map.lock().contains_key(&thread::current().id())
    }

    /// Hands out the next home-queue index, round-robin.
    pub(crate) fn next_task_id(&self) -> usize {
        self.task_count.fetch_add(1, Ordering::Relaxed) % self.num_threads
    }

    /// Hands out an identity for a temp runner.
    pub(crate) fn next_runner_id(&self) -> usize {
        self.current_id.fetch_add(1, Ordering::Relaxed) % self.num_threads
    }

    /// Routes `task` into the pool, preferring queue `id`.
    ///
    /// A stopped scheduler reports `true` and drops the task (its latch, if
    /// any, is notified by the drop); callers cannot tell a dropped task
    /// from an admitted one, which is the shutdown contract. Otherwise the
    /// home queue is tried first, then every other queue in round-robin
    /// order, and finally a blocking push on the home queue gated on the
    /// scheduler still running.
    pub(crate) fn send_task(&self, task: Task, id: usize) -> bool {
        if !self.started() {
            return true;
        }

        let mut task = match self.queues[id].try_push_back(task) {
            PushResult::Pushed => return true,
            PushResult::Rejected(task) => task,
        };

        let mut m = (id + 1) % self.num_threads;
        while m != id {
            if !self.started() {
                return true;
            }
            task = match self.queues[m].try_push_back(task) {
                PushResult::Pushed => return true,
                PushResult::Rejected(task) => task,
            };
            m = (m + 1) % self.num_threads;
        }

        matches!(
            push_back(&self.queues[id], task, || self.started()),
            PushResult::Pushed
        )
    }

    /// Takes the next task for worker `id`: own queue first, then every
    /// other queue in round-robin order, then a blocking pop on the own
    /// queue. `None` means the scheduler stopped (or the worker was told to)
    /// while waiting.
    pub(crate) fn wait_for_task_from_pool(&self, id: usize, token: &StopToken) -> Option<Task> {
        if !self.started() {
            return None;
        }
        if let Some(task) = self.queues[id].try_pop_front() {
            return Some(task);
        }

        let mut m = (id + 1) % self.num_threads;
        while m != id && self.started() {
            if let Some(task) = self.queues[m].try_pop_front() {
                return Some(task);
            }
            m = (m + 1) % self.num_threads;
        }

        pop_front(&self.queues[id], || {
            self.started() && token.can_continue()
        })
    }

    /// [`wait_for_task_from_pool`](Self::wait_for_task_from_pool) for temp
    /// runners: the blocking pop additionally wakes once `sem` is satisfied,
    /// which is how the runner learns its sponsoring wait has finished.
    pub(crate) fn wait_for_task_from_pool_gated(
        &self,
        id: usize,
        token: &StopToken,
        sem: &SharedLatch,
    ) -> Option<Task> {
        if !self.started() {
            return None;
        }
        if let Some(task) = self.queues[id].try_pop_front() {
            return Some(task);
        }

        let mut m = (id + 1) % self.num_threads;
        while m != id && self.started() {
            if let Some(task) = self.queues[m].try_pop_front() {
                return Some(task);
            }
            m = (m + 1) % self.num_threads;
        }

        pop_front(&self.queues[id], || {
            self.started() && token.can_continue() && !sem.try_wait()
        })
    }

    /// Pops and runs one task if any queue has one. Used by the task-wrapper
    /// drain loop so a finished task's worker keeps contributing.
    pub(crate) fn run_next_task(&self, id: usize) -> bool {
        if let Some(task) = self.queues[id].try_pop_front() {
            self.run_task(task);
            return true;
        }
        let mut m = (id + 1) % self.num_threads;
        while m != id {
            if let Some(task) = self.queues[m].try_pop_front() {
                self.run_task(task);
                return true;
            }
            m = (m + 1) % self.num_threads;
        }
        false
    }

    /// Runs one task at the worker boundary. A panic must never take the
    /// worker down: future-result cells capture their own failures, so
    /// anything surfacing here is from a bare task and is logged and
    /// swallowed.
    pub(crate) fn run_task(&self, task: Task) {
        if !self.started() {
            return;
        }
        if task.is_ready() {
            // Already satisfied through its latch; running it would be a
            // no-op with a double notification.
            return;
        }
        if catch_unwind(AssertUnwindSafe(|| task.execute())).is_err() {
            warn!("task panicked; the worker continues");
        }
    }

    /// Spawns one pinned worker per queue and records their thread ids.
    /// Idempotent while running.
    pub(crate) fn start(core: &Arc<Self>) {
        if core.running.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut threads = core.threads.lock();
        let mut thread_map = core.thread_map.lock();
        for id in 0..core.num_threads {
            let pool = Arc::downgrade(core);
            let worker = InterruptibleThread::spawn(format!("treadle-worker-{id}"), move |token| {
                worker_loop(&pool, id, &token);
            });
            if let Some(thread_id) = worker.thread_id() {
                drop(thread_map.insert(thread_id, id));
            }
            threads.push(worker);
        }
    }

    /// Stops the pool: no task is admitted afterwards, workers exit at their
    /// next check, and queued tasks are destroyed with their latches
    /// notified.
    pub(crate) fn stop(&self, block: bool) {
        self.running.store(false, Ordering::Release);

        let mut threads = std::mem::take(&mut *self.threads.lock());
        let current = thread::current().id();
        for mut worker in threads.drain(..) {
            worker.stop();
            // A worker can end up dropping the last facade handle and land
            // here for its own pool; joining itself would deadlock.
            if !block || worker.thread_id() == Some(current) {
                worker.detach();
            } else {
                worker.join();
            }
        }
        self.thread_map.lock().clear();

        for queue in &self.queues {
            queue.drain();
        }
        debug!(workers = self.num_threads, "scheduler stopped");
    }
}

impl std::fmt::Debug for SchedulerCore {
    #[cfg_attr(test, mutants::skip)] // We have no contract to test here - can return anything.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerCore")
            .field("num_threads", &self.num_threads)
            .field("running", &self.started())
            .finish_non_exhaustive()
    }
}

/// The body of a pool worker pinned to queue `id`.
fn worker_loop(core: &Weak<SchedulerCore>, id: usize, token: &StopToken) {
    debug!(worker = id, "worker started");
    loop {
        if !token.can_continue() {
            break;
        }
        let Some(pool) = core.upgrade() else {
            break;
        };
        if !pool.started() {
            break;
        }
        match pool.wait_for_task_from_pool(id, token) {
            Some(task) => pool.run_task(task),
            None => break,
        }
    }
    debug!(worker = id, "worker exited");
}

/// The body of a temp runner: a worker loop that additionally retires as
/// soon as `sem` is satisfied.
pub(crate) fn temp_runner_loop(
    core: &Weak<SchedulerCore>,
    id: usize,
    token: &StopToken,
    sem: &SharedLatch,
) {
    debug!(runner = id, "temp runner started");
    while token.can_continue() && !sem.try_wait() {
        let Some(pool) = core.upgrade() else {
            break;
        };
        if !pool.started() {
            break;
        }
        match pool.wait_for_task_from_pool_gated(id, token, sem) {
            Some(task) => pool.run_task(task),
            None => break,
        }
    }
    debug!(runner = id, "temp runner exited");
}
