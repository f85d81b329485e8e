// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::{Backoff, Task};

/// Capacity of every per-worker queue, fixed at construction. Submissions
/// beyond this spill to sibling queues and finally to a blocking push.
pub(crate) const TASK_QUEUE_CAPACITY: usize = 1024;

/// Outcome of a push attempt. Rejection hands the task back so the caller
/// can route it to another queue without losing it.
#[derive(Debug)]
pub(crate) enum PushResult {
    Pushed,
    Rejected(Task),
}

/// A bounded multi-producer/multi-consumer queue of [`Task`]s.
///
/// The `try_` operations use `try_lock`, so "failed" covers both a full (or
/// empty) queue and momentary contention from another producer or consumer.
/// That is deliberate: the scheduler reacts to failure by moving on to the
/// next queue, which is what spreads load across workers under contention.
///
/// The backing storage is allocated once; pushes that would exceed the
/// capacity are rejected rather than growing the buffer.
#[derive(Debug)]
pub(crate) struct TaskQueue {
    tasks: Mutex<VecDeque<Task>>,
    capacity: usize,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self::with_capacity(TASK_QUEUE_CAPACITY)
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        assert!(capacity >= 2, "queue capacity must hold at least two tasks");
        Self {
            tasks: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Attempts to enqueue `task` without blocking.
    pub(crate) fn try_push_back(&self, task: Task) -> PushResult {
        let Some(mut tasks) = self.tasks.try_lock() else {
            return PushResult::Rejected(task);
        };
        if tasks.len() >= self.capacity {
            return PushResult::Rejected(task);
        }
        tasks.push_back(task);
        PushResult::Pushed
    }

    /// Attempts to dequeue the oldest task without blocking. `None` covers
    /// both an empty queue and lock contention.
    pub(crate) fn try_pop_front(&self) -> Option<Task> {
        self.tasks.try_lock()?.pop_front()
    }

    /// Observed-consistent emptiness check.
    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    /// Destroys every queued task. Dropping a task notifies its latch, so
    /// draining at shutdown releases whoever was waiting on the work.
    pub(crate) fn drain(&self) {
        self.tasks.lock().clear();
    }
}

/// Repeatedly attempts to pop from `queue` while `can_continue()` holds,
/// backing off between attempts. Returns `None` once the predicate fails.
pub(crate) fn pop_front<P>(queue: &TaskQueue, can_continue: P) -> Option<Task>
where
    P: Fn() -> bool,
{
    let backoff = Backoff::new();
    loop {
        if let Some(task) = queue.try_pop_front() {
            return Some(task);
        }
        if !can_continue() {
            return None;
        }
        backoff.snooze();
    }
}

/// Repeatedly attempts to push onto `queue` while `can_continue()` holds,
/// backing off between attempts. The task is returned on abandonment.
pub(crate) fn push_back<P>(queue: &TaskQueue, task: Task, can_continue: P) -> PushResult
where
    P: Fn() -> bool,
{
    let backoff = Backoff::new();
    let mut task = task;
    loop {
        match queue.try_push_back(task) {
            PushResult::Pushed => return PushResult::Pushed,
            PushResult::Rejected(returned) => {
                if !can_continue() {
                    return PushResult::Rejected(returned);
                }
                task = returned;
                backoff.snooze();
            }
        }
    }
}
