// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::future::cell::Forwarder;
use crate::{FutureResult, SharedLatch, TaskError, TaskResult, schedule_task};

/// A bundle of continuations to fan one future result out to. Implemented
/// for tuples of callables, two to five wide; each member gets its own
/// successor future.
pub trait ForkFunctions<T>: Send + Sized + 'static {
    /// One successor future per member of the bundle.
    type Futures;

    /// Builds the successors and installs the fan-out forwarder on `source`.
    fn fork_from(self, source: &FutureResult<T>) -> Self::Futures;
}

impl<T> FutureResult<T>
where
    T: Clone + Send + 'static,
{
    /// Attaches several continuations at once, each producing its own
    /// successor future. All branch tasks are guarded by one shared latch,
    /// and a source error poisons every branch without invoking any of
    /// them.
    ///
    /// # Panics
    ///
    /// Panics if a continuation is already attached.
    pub fn fork<G>(&self, funcs: G) -> G::Futures
    where
        G: ForkFunctions<T>,
    {
        funcs.fork_from(self)
    }
}

macro_rules! impl_fork_functions {
    ($len:expr; $(($func:ident, $out:ident, $fut:ident)),+) => {
        impl<T, $($func, $out,)+> ForkFunctions<T> for ($($func,)+)
        where
            T: Clone + Send + 'static,
            $($func: FnOnce(T) -> $out + Send + 'static,)+
            $($out: Send + 'static,)+
        {
            type Futures = ($(FutureResult<$out>,)+);

            #[expect(non_snake_case, reason = "destructuring a tuple of type parameters")]
            fn fork_from(self, source: &FutureResult<T>) -> Self::Futures {
                let ($($func,)+) = self;
                let scheduler = source.scheduler().clone();
                $(let $fut = FutureResult::<$out>::new(&scheduler);)+

                let forwarder: Forwarder<T> = {
                    $(let $fut = $fut.clone();)+
                    Box::new(move |result: TaskResult<T>| match result {
                        Ok(value) => {
                            let latch = SharedLatch::with_count($len);
                            $(
                                let branch_value = value.clone();
                                // Settles the branch if its task is
                                // destroyed before running; destroying the
                                // task also notifies the shared latch.
                                let poison_on_drop =
                                    scopeguard::guard($fut, |cell| {
                                        if !cell.try_wait() {
                                            cell.set_error(TaskError::UnableToAddTask);
                                        }
                                    });
                                _ = schedule_task(
                                    latch.clone(),
                                    move || {
                                        let cell =
                                            scopeguard::ScopeGuard::into_inner(poison_on_drop);
                                        cell.from_code(move || $func(branch_value));
                                    },
                                    &scheduler,
                                );
                            )+
                        }
                        Err(error) => {
                            $($fut.set_error(error.clone());)+
                        }
                    })
                };

                source.install_forwarder(forwarder);
                ($($fut,)+)
            }
        }
    };
}

impl_fork_functions!(2; (F1, R1, fut1), (F2, R2, fut2));
impl_fork_functions!(3; (F1, R1, fut1), (F2, R2, fut2), (F3, R3, fut3));
impl_fork_functions!(4; (F1, R1, fut1), (F2, R2, fut2), (F3, R3, fut3), (F4, R4, fut4));
impl_fork_functions!(
    5;
    (F1, R1, fut1),
    (F2, R2, fut2),
    (F3, R3, fut3),
    (F4, R4, fut4),
    (F5, R5, fut5)
);
