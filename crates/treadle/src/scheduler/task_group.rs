// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{SharedLatch, TaskError, TaskResult, TaskScheduler};

/// Adds a single task to `scheduler` and ties `latch` to its completion.
///
/// Thin naming shim over [`TaskScheduler::add_task_with_latch`] for call
/// sites that read better with the latch first.
pub fn schedule_task<F>(latch: SharedLatch, task: F, scheduler: &TaskScheduler) -> bool
where
    F: FnOnce() + Send + 'static,
{
    scheduler.add_task_with_latch(task, latch)
}

/// Submits `task` and returns a latch that waits for its completion.
///
/// # Errors
///
/// [`TaskError::UnableToAddTask`] when the task could not be admitted.
pub fn create_waitable_task<F>(scheduler: &TaskScheduler, task: F) -> TaskResult<SharedLatch>
where
    F: FnOnce() + Send + 'static,
{
    let latch = SharedLatch::new();
    if !schedule_task(latch.clone(), task, scheduler) {
        return Err(TaskError::UnableToAddTask);
    }
    Ok(latch)
}

/// A fixed bundle of independent tasks, submitted together and awaited
/// through one latch. Implemented for tuples of callables up to eight wide.
pub trait TaskGroup {
    /// Number of tasks in the bundle.
    const LEN: usize;

    /// Submits every task, sharing `latch`. Tasks that cannot be admitted
    /// are destroyed, which notifies the latch, so waiters still complete.
    fn schedule(self, scheduler: &TaskScheduler, latch: &SharedLatch);
}

macro_rules! impl_task_group {
    ($len:expr; $($func:ident),+) => {
        impl<$($func,)+> TaskGroup for ($($func,)+)
        where
            $($func: FnOnce() + Send + 'static,)+
        {
            const LEN: usize = $len;

            #[expect(non_snake_case, reason = "destructuring a tuple of type parameters")]
            fn schedule(self, scheduler: &TaskScheduler, latch: &SharedLatch) {
                let ($($func,)+) = self;
                $(
                    // A task that cannot be admitted is destroyed on the
                    // spot, and destroying an unexecuted task notifies its
                    // latch, so the group completes either way.
                    _ = schedule_task(latch.clone(), $func, scheduler);
                )+
            }
        }
    };
}

impl_task_group!(1; F1);
impl_task_group!(2; F1, F2);
impl_task_group!(3; F1, F2, F3);
impl_task_group!(4; F1, F2, F3, F4);
impl_task_group!(5; F1, F2, F3, F4, F5);
impl_task_group!(6; F1, F2, F3, F4, F5, F6);
impl_task_group!(7; F1, F2, F3, F4, F5, F6, F7);
impl_task_group!(8; F1, F2, F3, F4, F5, F6, F7, F8);

/// Submits a bundle of concurrent tasks and returns a latch that waits for
/// all of them.
pub fn create_task_group<G>(scheduler: &TaskScheduler, tasks: G) -> SharedLatch
where
    G: TaskGroup,
{
    let latch = SharedLatch::with_count(G::LEN);
    tasks.schedule(scheduler, &latch);
    latch
}

/// Runs a bundle of concurrent tasks and returns when all have completed.
/// Safe to call from inside the pool: the wait is re-entrant.
pub fn invoke_tasks<G>(scheduler: &TaskScheduler, tasks: G)
where
    G: TaskGroup,
{
    let group = create_task_group(scheduler, tasks);
    scheduler.wait_for(&group);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use treadle_testing::execute_or_abandon;

    use super::*;

    #[test]
    fn waitable_task_completes_through_its_latch() {
        let scheduler = TaskScheduler::builder().with_thread_count(2).build();
        let ran = Arc::new(AtomicUsize::new(0));

        let latch = create_waitable_task(&scheduler, {
            let ran = Arc::clone(&ran);
            move || {
                _ = ran.fetch_add(1, Ordering::AcqRel);
            }
        })
        .expect("submission failed");

        execute_or_abandon(move || latch.wait()).expect("task did not complete");
        assert_eq!(ran.load(Ordering::Acquire), 1);
        scheduler.stop(true);
    }

    #[test]
    fn waitable_task_on_a_stopped_scheduler_releases_its_latch() {
        let scheduler = TaskScheduler::new(1, true);
        // Never started: the submission is silently dropped, and the drop
        // releases the latch so nobody waits forever.
        let latch = create_waitable_task(&scheduler, || {}).expect("drop counts as admission");
        assert!(latch.try_wait());
    }

    #[test]
    fn invoke_tasks_runs_the_whole_bundle() {
        let scheduler = TaskScheduler::builder().with_thread_count(2).build();
        let counter = Arc::new(AtomicUsize::new(0));

        let make = || {
            let counter = Arc::clone(&counter);
            move || {
                _ = counter.fetch_add(1, Ordering::AcqRel);
            }
        };

        execute_or_abandon({
            let scheduler = scheduler.clone();
            let tasks = (make(), make(), make());
            move || invoke_tasks(&scheduler, tasks)
        })
        .expect("task group did not complete");

        assert_eq!(counter.load(Ordering::Acquire), 3);
        scheduler.stop(true);
    }
}
