// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Parallel range algorithms over slices, built on the `treadle` scheduler.
//!
//! Every algorithm partitions its input into chunks (one per unit of pool
//! capacity, subject to a per-algorithm minimum chunk size), submits one
//! task per chunk, and waits for all of them before returning. Inputs below
//! the minimum chunk size are processed serially on the calling thread.
//!
//! Each algorithm comes in two forms: `foo(...)` runs on the process-wide
//! default scheduler, `foo_in(&scheduler, ...)` on an explicit one.
//!
//! Because the algorithms block until their tasks have finished, they can
//! borrow their inputs like their serial counterparts do; no `'static`
//! bound is required on the data. Failing to admit a chunk task is a fatal
//! contract violation and panics after all admitted chunks have completed.

// Public API surface.
mod bitonic;
mod for_each;
mod reduce;
mod scan;
mod search;
mod sort;
mod transform;

pub use bitonic::*;
pub use for_each::*;
pub use reduce::*;
pub use scan::*;
pub use search::*;
pub use sort::*;
pub use transform::*;

// Internal plumbing.
mod dispatch;
mod partition;

pub(crate) use dispatch::{SlicePtr, run_chunked, run_chunked_from};
pub(crate) use partition::{
    MIN_CHUNK_BITONIC, MIN_CHUNK_FOR_EACH, MIN_CHUNK_REDUCE, MIN_CHUNK_SCAN, MIN_CHUNK_SORT,
    MIN_CHUNK_TRANSFORM, split_range,
};
