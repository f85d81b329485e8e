// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::future::submit_try_fulfiller;
use crate::{
    FutureResult, SharedLatch, TaskError, TaskResult, TaskScheduler, get_task_scheduler,
    schedule_task,
};

/// A bundle of functions submitted together against one set of arguments,
/// producing a future of every member's individual [`TaskResult`].
///
/// Wrapping each branch's outcome separately is the point: one branch
/// panicking must not hide another branch's value.
pub trait FutureResultGroup<A>: Send + Sized + 'static {
    /// Tuple of per-branch results.
    type Results: Send + 'static;

    /// Submits one task per member and a collector that fulfils the
    /// returned future once every member has finished.
    fn submit(self, scheduler: &TaskScheduler, args: A) -> FutureResult<Self::Results>;
}

/// Builds a callable that fans `funcs` out over the process-wide scheduler:
/// invoking it with arguments submits every function as its own task and
/// returns a future that becomes ready when all of them have completed,
/// with each branch's outcome wrapped in its own [`TaskResult`].
pub fn make_future_result_group<A, G>(funcs: G) -> impl FnOnce(A) -> FutureResult<G::Results>
where
    G: FutureResultGroup<A>,
{
    move |args| {
        let scheduler = get_task_scheduler();
        funcs.submit(&scheduler, args)
    }
}

/// A settled branch cell yields its outcome; a branch whose task was
/// destroyed unrun (scheduler shutdown) yields the admission error.
fn settled_result<T>(cell: &FutureResult<T>) -> TaskResult<T>
where
    T: Send + 'static,
{
    if cell.is_ready() {
        cell.get()
    } else {
        Err(TaskError::UnableToAddTask)
    }
}

macro_rules! impl_future_result_group {
    ($len:expr; $(($func:ident, $out:ident, $cell:ident)),+) => {
        impl<A, $($func, $out,)+> FutureResultGroup<A> for ($($func,)+)
        where
            A: Clone + Send + 'static,
            $($func: FnOnce(A) -> $out + Send + 'static,)+
            $($out: Send + 'static,)+
        {
            type Results = ($(TaskResult<$out>,)+);

            #[expect(non_snake_case, reason = "destructuring a tuple of type parameters")]
            fn submit(self, scheduler: &TaskScheduler, args: A) -> FutureResult<Self::Results> {
                let ($($func,)+) = self;
                let all_branches = SharedLatch::with_count($len);
                $(let $cell = FutureResult::<$out>::new(scheduler);)+

                $(
                    {
                        let cell = $cell.clone();
                        let branch_args = args.clone();
                        // A branch task destroyed before running notifies
                        // the shared latch by drop; the guard settles its
                        // cell so the collector below never hangs on it.
                        let poison_on_drop = scopeguard::guard(cell, |cell| {
                            if !cell.try_wait() {
                                cell.set_error(TaskError::UnableToAddTask);
                            }
                        });
                        _ = schedule_task(
                            all_branches.clone(),
                            move || {
                                let cell = scopeguard::ScopeGuard::into_inner(poison_on_drop);
                                cell.from_code(move || $func(branch_args));
                            },
                            scheduler,
                        );
                    }
                )+

                let group = FutureResult::<Self::Results>::new(scheduler);
                let collector_scheduler = scheduler.clone();
                submit_try_fulfiller(scheduler, &group, move || {
                    collector_scheduler.wait_for(&all_branches);
                    Ok(($(settled_result(&$cell),)+))
                });
                group
            }
        }
    };
}

impl_future_result_group!(1; (F1, R1, cell1));
impl_future_result_group!(2; (F1, R1, cell1), (F2, R2, cell2));
impl_future_result_group!(3; (F1, R1, cell1), (F2, R2, cell2), (F3, R3, cell3));
impl_future_result_group!(4; (F1, R1, cell1), (F2, R2, cell2), (F3, R3, cell3), (F4, R4, cell4));
impl_future_result_group!(
    5;
    (F1, R1, cell1),
    (F2, R2, cell2),
    (F3, R3, cell3),
    (F4, R4, cell4),
    (F5, R5, cell5)
);
