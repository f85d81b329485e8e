// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Treadle is a user-space fork/join task-execution library: a fixed pool of
//! worker threads with per-worker task queues, one-shot future results that
//! can be chained and fanned out, and composition helpers for building
//! pipelines of functions that execute through the pool.
//!
//! Three pieces cooperate:
//!
//! 1. The [`TaskScheduler`] owns N worker threads, each pinned to one bounded
//!    queue. Tasks migrate between queues when producers or consumers hit
//!    contention, and a worker that has to wait for a result keeps running
//!    other tasks instead of parking (see [`TaskScheduler::wait_for_scope`]).
//! 2. [`FutureResult`] is a one-shot value-or-error cell. Attaching a
//!    continuation *before* the value arrives forwards the value into the
//!    successor without ever storing it.
//! 3. [`FunctionStream`] threads a list of functions through the scheduler,
//!    one task per stage, fulfilling a future result at the end.
//!
//! Parallel range algorithms built on these live in the `treadle_par` crate.

// Public API surface.
mod compose;
mod error;
mod future;
mod latch;
mod scheduler;
mod task;

pub use compose::*;
pub use error::*;
pub use future::*;
pub use latch::*;
pub use scheduler::*;
pub use task::*;

// Internal to the crate but re-exported at crate root for reduced hassle.
mod backoff;
mod queue;
mod thread;

pub(crate) use backoff::Backoff;
pub(crate) use queue::{PushResult, TaskQueue, pop_front, push_back};
pub(crate) use thread::{InterruptibleThread, StopToken};
