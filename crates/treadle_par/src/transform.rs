// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use treadle::{TaskScheduler, get_task_scheduler};

use crate::{MIN_CHUNK_TRANSFORM, SlicePtr, run_chunked, split_range};

/// Writes `func(input[i])` to `output[i]` for every position, chunked
/// across the pool. Output positions are derived from the distance to the
/// input's start.
///
/// # Panics
///
/// Panics if the output length does not match the input length.
pub fn transform<T, U, F>(input: &[T], output: &mut [U], func: F)
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Send + Sync,
{
    transform_in(&get_task_scheduler(), input, output, func);
}

/// [`transform`] on an explicit scheduler.
pub fn transform_in<T, U, F>(scheduler: &TaskScheduler, input: &[T], output: &mut [U], func: F)
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Send + Sync,
{
    assert_eq!(
        input.len(),
        output.len(),
        "transform output length must match the input"
    );

    let chunks = split_range(input.len(), scheduler.size(), MIN_CHUNK_TRANSFORM);
    if chunks.len() <= 1 {
        for (out, item) in output.iter_mut().zip(input) {
            *out = func(item);
        }
        return;
    }

    let out = SlicePtr::new(output);
    run_chunked(scheduler, &chunks, |range, _index| {
        // SAFETY: chunks are pairwise disjoint and the output outlives the
        // wait inside run_chunked.
        let out_chunk = unsafe { out.chunk_mut(range.clone()) };
        for (out, item) in out_chunk.iter_mut().zip(&input[range]) {
            *out = func(item);
        }
    });
}

/// Binary [`transform`]: writes `func(&input1[i], &input2[i])` to
/// `output[i]`.
///
/// # Panics
///
/// Panics if the three lengths do not all match.
pub fn transform2<T1, T2, U, F>(input1: &[T1], input2: &[T2], output: &mut [U], func: F)
where
    T1: Sync,
    T2: Sync,
    U: Send,
    F: Fn(&T1, &T2) -> U + Send + Sync,
{
    transform2_in(&get_task_scheduler(), input1, input2, output, func);
}

/// [`transform2`] on an explicit scheduler.
pub fn transform2_in<T1, T2, U, F>(
    scheduler: &TaskScheduler,
    input1: &[T1],
    input2: &[T2],
    output: &mut [U],
    func: F,
) where
    T1: Sync,
    T2: Sync,
    U: Send,
    F: Fn(&T1, &T2) -> U + Send + Sync,
{
    assert_eq!(
        input1.len(),
        input2.len(),
        "transform inputs must have matching lengths"
    );
    assert_eq!(
        input1.len(),
        output.len(),
        "transform output length must match the inputs"
    );

    let chunks = split_range(input1.len(), scheduler.size(), MIN_CHUNK_TRANSFORM);
    if chunks.len() <= 1 {
        for ((out, lhs), rhs) in output.iter_mut().zip(input1).zip(input2) {
            *out = func(lhs, rhs);
        }
        return;
    }

    let out = SlicePtr::new(output);
    run_chunked(scheduler, &chunks, |range, _index| {
        // SAFETY: chunks are pairwise disjoint and the output outlives the
        // wait inside run_chunked.
        let out_chunk = unsafe { out.chunk_mut(range.clone()) };
        for ((out, lhs), rhs) in out_chunk
            .iter_mut()
            .zip(&input1[range.clone()])
            .zip(&input2[range])
        {
            *out = func(lhs, rhs);
        }
    });
}
