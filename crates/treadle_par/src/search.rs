// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use treadle::{TaskScheduler, get_task_scheduler};

use crate::{MIN_CHUNK_FOR_EACH, run_chunked, split_range};

/// How many elements a search task scans between checks of the shared
/// short-circuit state.
fn search_stride() -> usize {
    thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get) * 100
}

/// Position of the first element satisfying `pred`, or `None`.
///
/// Chunks scan concurrently in strided blocks; once a chunk reports a hit,
/// chunks at higher positions abandon their remaining work, so the lowest
/// position always wins while later chunks stop early.
pub fn find_if<T, P>(items: &[T], pred: P) -> Option<usize>
where
    T: Sync,
    P: Fn(&T) -> bool + Send + Sync,
{
    find_if_in(&get_task_scheduler(), items, pred)
}

/// [`find_if`] on an explicit scheduler.
pub fn find_if_in<T, P>(scheduler: &TaskScheduler, items: &[T], pred: P) -> Option<usize>
where
    T: Sync,
    P: Fn(&T) -> bool + Send + Sync,
{
    let chunks = split_range(items.len(), scheduler.size(), MIN_CHUNK_FOR_EACH);
    if chunks.len() <= 1 {
        return items.iter().position(pred);
    }

    // Per-chunk hit positions; `usize::MAX` marks "no hit".
    let hits: Vec<AtomicUsize> = (0..chunks.len())
        .map(|_| AtomicUsize::new(usize::MAX))
        .collect();
    // Lowest chunk index with a confirmed hit so far.
    let lowest_hit_chunk = AtomicUsize::new(usize::MAX);
    let stride = search_stride();

    run_chunked(scheduler, &chunks, |range, index| {
        let chunk = &items[range.clone()];
        let mut block_start = 0;
        while block_start < chunk.len() {
            let block_end = (block_start + stride).min(chunk.len());
            for offset in block_start..block_end {
                if pred(&chunk[offset]) {
                    hits[index].store(range.start + offset, Ordering::Release);
                    _ = lowest_hit_chunk.fetch_min(index, Ordering::AcqRel);
                    return;
                }
            }
            // A hit in a lower chunk beats anything this chunk could still
            // find; a hit in a higher chunk must not stop us.
            if index > lowest_hit_chunk.load(Ordering::Acquire) {
                return;
            }
            block_start = block_end;
        }
    });

    hits.iter().find_map(|hit| {
        let position = hit.load(Ordering::Acquire);
        (position != usize::MAX).then_some(position)
    })
}

/// Whether the two ranges are element-wise equal under `pred`. Ranges of
/// different lengths are unequal; a single mismatch short-circuits every
/// other chunk at its next block boundary.
pub fn equal<T1, T2, P>(lhs: &[T1], rhs: &[T2], pred: P) -> bool
where
    T1: Sync,
    T2: Sync,
    P: Fn(&T1, &T2) -> bool + Send + Sync,
{
    equal_in(&get_task_scheduler(), lhs, rhs, pred)
}

/// [`equal`] with the `==` comparison.
pub fn equal_eq<T>(lhs: &[T], rhs: &[T]) -> bool
where
    T: PartialEq + Sync,
{
    equal_in(&get_task_scheduler(), lhs, rhs, |a, b| a == b)
}

/// [`equal`] on an explicit scheduler.
pub fn equal_in<T1, T2, P>(scheduler: &TaskScheduler, lhs: &[T1], rhs: &[T2], pred: P) -> bool
where
    T1: Sync,
    T2: Sync,
    P: Fn(&T1, &T2) -> bool + Send + Sync,
{
    if lhs.len() != rhs.len() {
        return false;
    }

    let chunks = split_range(lhs.len(), scheduler.size(), MIN_CHUNK_FOR_EACH);
    if chunks.len() <= 1 {
        return lhs.iter().zip(rhs).all(|(a, b)| pred(a, b));
    }

    let is_equal = AtomicBool::new(true);
    let stride = search_stride();

    run_chunked(scheduler, &chunks, |range, _index| {
        let left = &lhs[range.clone()];
        let right = &rhs[range];
        let mut block_start = 0;
        while block_start < left.len() && is_equal.load(Ordering::Acquire) {
            let block_end = (block_start + stride).min(left.len());
            for offset in block_start..block_end {
                if !pred(&left[offset], &right[offset]) {
                    is_equal.store(false, Ordering::Release);
                    return;
                }
            }
            block_start = block_end;
        }
    });

    is_equal.load(Ordering::Acquire)
}
