// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::{Arc, Weak};
use std::thread;

use crate::scheduler::{SchedulerCore, TempTaskRunner};
use crate::{SchedulerHandle, SharedLatch, Task, TaskSchedulerBuilder, Waitable};

/// Keeps the pool running for exactly as long as at least one
/// [`TaskScheduler`] clone exists; the last one to go stops it.
pub(crate) struct SchedulerOwner {
    pub(crate) core: Arc<SchedulerCore>,
}

impl Drop for SchedulerOwner {
    // Inconvenient to test because we would be checking for "does some code stop executing".
    #[cfg_attr(test, mutants::skip)]
    fn drop(&mut self) {
        self.core.stop(self.core.block_on_shutdown());
    }
}

impl std::fmt::Debug for SchedulerOwner {
    #[cfg_attr(test, mutants::skip)] // We have no contract to test here - can return anything.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.core.fmt(f)
    }
}

/// A fixed pool of worker threads, each draining its own bounded task queue
/// and stealing from its siblings when idle.
///
/// Cloning is cheap and every clone controls the same pool. When the last
/// clone is dropped the pool stops; whether that blocks until in-flight
/// tasks finish is decided by the `block_on_shutdown` flag given at
/// construction.
///
/// There is no ordering guarantee between tasks: submissions are distributed
/// round-robin over the queues and any worker may steal any queued task.
///
/// # Thread safety
///
/// This type is thread-safe; share clones freely. Avoid dropping the last
/// clone from inside one of the pool's own tasks - the pool winds down, but
/// that worker cannot be joined by itself and is detached instead.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    owner: Arc<SchedulerOwner>,
}

impl TaskScheduler {
    /// Creates a scheduler with `num_threads` queues. Workers are not
    /// started; call [`start`](Self::start).
    ///
    /// # Panics
    ///
    /// Panics if `num_threads` is zero.
    #[must_use]
    pub fn new(num_threads: usize, block_on_shutdown: bool) -> Self {
        Self {
            owner: Arc::new(SchedulerOwner {
                core: Arc::new(SchedulerCore::new(num_threads, block_on_shutdown)),
            }),
        }
    }

    /// Starts configuring a scheduler with default settings.
    #[must_use]
    pub fn builder() -> TaskSchedulerBuilder {
        TaskSchedulerBuilder::new()
    }

    pub(crate) fn from_owner(owner: Arc<SchedulerOwner>) -> Self {
        Self { owner }
    }

    fn weak_core(&self) -> Weak<SchedulerCore> {
        Arc::downgrade(&self.owner.core)
    }

    /// Spawns one worker per queue. Idempotent while running; a stopped
    /// scheduler can be started again.
    pub fn start(&self) {
        SchedulerCore::start(&self.owner.core);
    }

    /// Stops the pool. In-flight tasks run to completion, queued tasks are
    /// destroyed (notifying their latches), and later submissions are
    /// silently dropped. With `block` the call waits for every worker to
    /// exit.
    pub fn stop(&self, block: bool) {
        self.owner.core.stop(block);
    }

    /// Whether the pool is accepting and running tasks.
    #[must_use]
    pub fn started(&self) -> bool {
        self.owner.core.started()
    }

    /// The number of worker threads (and queues).
    #[must_use]
    pub fn size(&self) -> usize {
        self.owner.core.size()
    }

    /// Hands out a weak handle to this scheduler.
    #[must_use]
    pub fn get_handle(&self) -> SchedulerHandle {
        SchedulerHandle::new(Arc::downgrade(&self.owner))
    }

    /// Submits a task. Returns `true` when the task was admitted - which
    /// includes the case of a stopped scheduler silently dropping it, per
    /// the shutdown contract; `false` means the blocking fallback gave up
    /// because the scheduler stopped mid-push.
    pub fn add_task<F>(&self, func: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.owner.core.next_task_id();
        let task = Task::new(self.wrap_task(func, id, None));
        self.owner.core.send_task(task, id)
    }

    /// [`add_task`](Self::add_task), with `latch` notified when the task
    /// body completes (normally or by panic). The latch fires after the
    /// body, not after the worker's opportunistic drain of further tasks.
    pub fn add_task_with_latch<F>(&self, func: F, latch: SharedLatch) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.owner.core.next_task_id();
        let wrapper = self.wrap_task(func, id, Some(latch.clone()));
        self.owner.core.send_task(Task::with_latch(wrapper, latch), id)
    }

    /// Wraps a task body so that, after it runs, the hosting worker keeps
    /// draining queued tasks while the scheduler is running. The wrapper
    /// holds only a weak reference; if the scheduler is gone by execution
    /// time the body is skipped and the latch (if any) still released.
    fn wrap_task<F>(
        &self,
        func: F,
        id: usize,
        latch: Option<SharedLatch>,
    ) -> impl FnOnce() + Send + 'static + use<F>
    where
        F: FnOnce() + Send + 'static,
    {
        let core = self.weak_core();
        move || {
            let Some(pool) = core.upgrade() else {
                if let Some(latch) = latch {
                    latch.notify();
                }
                return;
            };
            {
                let _completion = latch.map(|latch| scopeguard::guard(latch, |latch| latch.notify()));
                func();
            }
            while pool.started() && pool.run_next_task(id) {
                thread::yield_now();
            }
        }
    }

    /// Runs `func` on the calling thread while compensating the pool for
    /// the capacity `func` is about to block: when every queue has work, a
    /// temp runner is enlisted for the duration of the call.
    ///
    /// This is what makes nested waits safe - a pool task that blocks on a
    /// future produced by another pool task cannot starve the pool, because
    /// the blocked capacity is replaced for as long as the wait lasts.
    pub fn wait_for_scope<F, R>(&self, func: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _compensation = if self.owner.core.has_empty_queue() {
            None
        } else {
            Some(self.start_temp_task_runner())
        };
        func()
    }

    /// Blocks on `waitable` through [`wait_for_scope`](Self::wait_for_scope).
    pub fn wait_for<W>(&self, waitable: &W)
    where
        W: Waitable + ?Sized,
    {
        self.wait_for_scope(|| waitable.wait());
    }

    /// Whether the calling thread is one of this pool's workers.
    pub(crate) fn is_worker_thread(&self) -> bool {
        self.owner.core.is_worker_thread()
    }

    fn start_temp_task_runner(&self) -> TempTaskRunner {
        TempTaskRunner::start(self.weak_core(), self.owner.core.next_runner_id())
    }
}
