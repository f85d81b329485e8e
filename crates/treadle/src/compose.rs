// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Pipelines of functions threaded through the scheduler: each stage runs as
//! its own task, the output of one stage becoming the input of the next,
//! with a future result fulfilled by the final stage.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::{FutureResult, TaskError, TaskResult, TaskScheduler, Waitable, get_task_scheduler};

/// Continuation passed between pipeline stages; receives the stage's
/// outcome.
pub type StageContinuation<B> = Box<dyn FnOnce(TaskResult<B>) + Send>;

/// Shared per-invocation state consulted at every stage boundary.
pub struct StreamControl {
    continue_on_result_destruction: bool,
    result_alive: Box<dyn Fn() -> bool + Send + Sync>,
}

impl StreamControl {
    /// Whether the next stage should run. Once the consumer-side future has
    /// been dropped, streams configured to do so abandon the remainder of
    /// the chain at the stage boundary (never mid-stage).
    #[must_use]
    pub fn should_continue(&self) -> bool {
        self.continue_on_result_destruction || (self.result_alive)()
    }
}

impl std::fmt::Debug for StreamControl {
    #[cfg_attr(test, mutants::skip)] // We have no contract to test here - can return anything.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamControl")
            .field(
                "continue_on_result_destruction",
                &self.continue_on_result_destruction,
            )
            .finish_non_exhaustive()
    }
}

/// One link of a function stream: consumes an input, schedules itself on
/// the pool, and hands its outcome to the continuation.
pub trait StreamStage<A>: Send + Sized + 'static
where
    A: Send + 'static,
{
    /// The type this stage produces.
    type Output: Send + 'static;

    /// Runs the stage as a scheduler task and forwards the outcome.
    fn run_streamed(
        self,
        scheduler: &TaskScheduler,
        args: A,
        control: &Arc<StreamControl>,
        done: StageContinuation<Self::Output>,
    );
}

/// A plain function lifted into a pipeline stage.
pub struct FnStage<F> {
    func: F,
}

impl<F> std::fmt::Debug for FnStage<F> {
    #[cfg_attr(test, mutants::skip)] // We have no contract to test here - can return anything.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").finish_non_exhaustive()
    }
}

impl<A, B, F> StreamStage<A> for FnStage<F>
where
    A: Send + 'static,
    B: Send + 'static,
    F: FnOnce(A) -> B + Send + 'static,
{
    type Output = B;

    fn run_streamed(
        self,
        scheduler: &TaskScheduler,
        args: A,
        control: &Arc<StreamControl>,
        done: StageContinuation<B>,
    ) {
        let control = Arc::clone(control);
        let func = self.func;
        // If the stage task never runs (stopped scheduler, or destroyed in
        // a queue at shutdown) the chain still resolves, with the admission
        // error.
        let fallback = scopeguard::guard(done, |done| done(Err(TaskError::UnableToAddTask)));
        _ = scheduler.started()
            && scheduler.add_task(move || {
                let done = scopeguard::ScopeGuard::into_inner(fallback);
                if !control.should_continue() {
                    return;
                }
                match catch_unwind(AssertUnwindSafe(move || func(args))) {
                    Ok(value) => done(Ok(value)),
                    Err(payload) => done(Err(TaskError::from_panic(payload.as_ref()))),
                }
            });
    }
}

/// Two stages run back to back: the first's output feeds the second.
#[derive(Debug)]
pub struct StageChain<S1, S2> {
    first: S1,
    second: S2,
}

impl<A, S1, S2> StreamStage<A> for StageChain<S1, S2>
where
    A: Send + 'static,
    S1: StreamStage<A>,
    S2: StreamStage<S1::Output>,
{
    type Output = S2::Output;

    fn run_streamed(
        self,
        scheduler: &TaskScheduler,
        args: A,
        control: &Arc<StreamControl>,
        done: StageContinuation<Self::Output>,
    ) {
        let Self { first, second } = self;
        let next_scheduler = scheduler.clone();
        let next_control = Arc::clone(control);
        first.run_streamed(
            scheduler,
            args,
            control,
            Box::new(move |result| match result {
                Ok(value) => second.run_streamed(&next_scheduler, value, &next_control, done),
                Err(error) => done(Err(error)),
            }),
        );
    }
}

/// A composable chain of functions where the output of one is the input of
/// the next, applied through the scheduler one task per stage.
///
/// Build one with [`future_generator`] or the [`compose_future!`] macro,
/// extend it with [`then`](Self::then) or the `|` operator, then
/// [`apply`](Self::apply) it to arguments to obtain the future of the final
/// stage's result. A stage that panics poisons the result; later stages are
/// skipped.
#[derive(Debug)]
pub struct FunctionStream<S> {
    stage: S,
    /// When `false`, dropping the consumer-side future abandons the chain at
    /// the next stage boundary instead of running it to completion.
    pub continue_on_result_destruction: bool,
}

impl<S> FunctionStream<S> {
    /// Appends a stage.
    pub fn then<G>(self, func: G) -> FunctionStream<StageChain<S, FnStage<G>>> {
        FunctionStream {
            stage: StageChain {
                first: self.stage,
                second: FnStage { func },
            },
            continue_on_result_destruction: self.continue_on_result_destruction,
        }
    }

    /// Concatenates two streams; `self`'s stages run first.
    pub fn concat<S2>(self, other: FunctionStream<S2>) -> FunctionStream<StageChain<S, S2>> {
        FunctionStream {
            stage: StageChain {
                first: self.stage,
                second: other.stage,
            },
            continue_on_result_destruction: self.continue_on_result_destruction,
        }
    }

    /// Applies the stream to `args` through the process-wide scheduler.
    pub fn apply<A>(self, args: A) -> FutureResult<S::Output>
    where
        S: StreamStage<A>,
        A: Send + 'static,
    {
        self.apply_in(&get_task_scheduler(), args)
    }

    /// Applies the stream to `args` through `scheduler`, returning the
    /// future the final stage fulfils.
    pub fn apply_in<A>(self, scheduler: &TaskScheduler, args: A) -> FutureResult<S::Output>
    where
        S: StreamStage<A>,
        A: Send + 'static,
    {
        let result = FutureResult::<S::Output>::new(scheduler);

        let liveness = result.get_handle();
        let control = Arc::new(StreamControl {
            continue_on_result_destruction: self.continue_on_result_destruction,
            result_alive: Box::new(move || !liveness.expired()),
        });

        // The chain holds only a weak handle on the result so that dropping
        // the consumer side is observable to the control above.
        let sink = result.get_handle();
        let done: StageContinuation<S::Output> = Box::new(move |outcome| {
            if let Some(result) = sink.lock() {
                match outcome {
                    Ok(value) => result.set_value(value),
                    Err(error) => result.set_error(error),
                }
            }
        });

        self.stage.run_streamed(scheduler, args, &control, done);
        result
    }
}

/// Starts a function stream from a single function.
pub fn future_generator<F>(func: F) -> FunctionStream<FnStage<F>> {
    FunctionStream {
        stage: FnStage { func },
        continue_on_result_destruction: true,
    }
}

/// Blocks until every given waitable - typically the future results of
/// several applied streams - has completed.
pub fn wait_for_function_streams(streams: &[&dyn Waitable]) {
    for stream in streams {
        stream.wait();
    }
}

impl<S1, S2> std::ops::BitOr<FunctionStream<S2>> for FunctionStream<S1> {
    type Output = FunctionStream<StageChain<S1, S2>>;

    /// Pipeline concatenation: `generator | generator`.
    fn bitor(self, rhs: FunctionStream<S2>) -> Self::Output {
        self.concat(rhs)
    }
}

/// Builds a [`FunctionStream`] from a list of functions, first to last:
///
/// ```
/// # use treadle::compose_future;
/// let double_then_add = compose_future!(|x: i32| x * 2, |x: i32| x + 1);
/// assert_eq!(double_then_add.apply(20).get(), Ok(41));
/// ```
#[macro_export]
macro_rules! compose_future {
    ($first:expr $(, $rest:expr)* $(,)?) => {
        $crate::future_generator($first)$(.then($rest))*
    };
}
