// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::FutureResult;
use crate::future::make_future_result_from_try;

/// A tuple of future results that can be awaited together and fed, unpacked,
/// into one function. Implemented for tuples two to five wide.
pub trait JoinableFutures<F, R>: Send + Sized + 'static {
    /// Synthesises a future that waits for every input inside a scheduler
    /// task and then applies `func` to the values.
    fn join_with(self, func: F) -> FutureResult<R>;
}

/// Awaits all the futures in `futures` and applies `func` to their values.
/// An error in any input short-circuits: `func` is skipped and the returned
/// future carries the first failing input's error.
///
/// The inner waits run inside a scheduler task, so joining from within the
/// pool cannot deadlock it.
pub fn join<Fs, F, R>(futures: Fs, func: F) -> FutureResult<R>
where
    Fs: JoinableFutures<F, R>,
{
    futures.join_with(func)
}

macro_rules! impl_joinable_futures {
    ($(($value:ident, $fut:ident)),+) => {
        impl<F, R, $($value,)+> JoinableFutures<F, R> for ($(FutureResult<$value>,)+)
        where
            F: FnOnce($($value,)+) -> R + Send + 'static,
            R: Send + 'static,
            $($value: Send + 'static,)+
        {
            #[expect(non_snake_case, reason = "destructuring a tuple of type parameters")]
            fn join_with(self, func: F) -> FutureResult<R> {
                let scheduler = self.0.scheduler().clone();
                let ($($fut,)+) = self;
                make_future_result_from_try(&scheduler, move || {
                    $(let $value = $fut.get()?;)+
                    Ok(func($($value,)+))
                })
            }
        }
    };
}

impl_joinable_futures!((T1, fut1), (T2, fut2));
impl_joinable_futures!((T1, fut1), (T2, fut2), (T3, fut3));
impl_joinable_futures!((T1, fut1), (T2, fut2), (T3, fut3), (T4, fut4));
impl_joinable_futures!((T1, fut1), (T2, fut2), (T3, fut3), (T4, fut4), (T5, fut5));
