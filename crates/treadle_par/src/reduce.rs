// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cmp::Ordering;

use treadle::{TaskScheduler, get_task_scheduler};

use crate::{MIN_CHUNK_REDUCE, SlicePtr, run_chunked, split_range};

/// Folds the range with `op`, seeded with `init`.
///
/// Each chunk is folded serially (seeded with its own first element), then
/// the per-chunk partials are folded serially, seeded with `init`. For an
/// associative `op` the result equals the serial fold; non-associative
/// operators get an unspecified grouping.
pub fn reduce<T, Op>(items: &[T], init: T, op: Op) -> T
where
    T: Clone + Send + Sync,
    Op: Fn(T, T) -> T + Send + Sync,
{
    reduce_in(&get_task_scheduler(), items, init, op)
}

/// [`reduce`] on an explicit scheduler.
pub fn reduce_in<T, Op>(scheduler: &TaskScheduler, items: &[T], init: T, op: Op) -> T
where
    T: Clone + Send + Sync,
    Op: Fn(T, T) -> T + Send + Sync,
{
    if items.is_empty() {
        return init;
    }

    let chunks = split_range(items.len(), scheduler.size(), MIN_CHUNK_REDUCE);
    if chunks.len() <= 1 {
        return items.iter().cloned().fold(init, op);
    }

    let mut partials: Vec<Option<T>> = vec![None; chunks.len()];
    let slots = SlicePtr::new(&mut partials);
    run_chunked(scheduler, &chunks, |range, index| {
        // SAFETY: one slot per chunk, and the partials vector outlives the
        // wait inside run_chunked.
        let slot = unsafe { slots.chunk_mut(index..index + 1) };
        let chunk = &items[range];
        slot[0] = Some(
            chunk[1..]
                .iter()
                .cloned()
                .fold(chunk[0].clone(), |acc, item| op(acc, item)),
        );
    });

    partials.into_iter().fold(init, |acc, partial| {
        let partial =
            partial.unwrap_or_else(|| panic!("scheduler stopped before the chunk completed"));
        op(acc, partial)
    })
}

/// Maps every element with `map`, then folds the mapped values with
/// `reduce`, seeded with `map(init)`.
///
/// # Panics
///
/// Panics if the range holds fewer than two elements; that is a contract
/// violation for this operation.
pub fn map_reduce<T, U, M, R>(items: &[T], init: &T, map: M, reduce: R) -> U
where
    T: Sync,
    U: Send,
    M: Fn(&T) -> U + Send + Sync,
    R: Fn(U, U) -> U + Send + Sync,
{
    map_reduce_in(&get_task_scheduler(), items, init, map, reduce)
}

/// [`map_reduce`] on an explicit scheduler.
pub fn map_reduce_in<T, U, M, R>(
    scheduler: &TaskScheduler,
    items: &[T],
    init: &T,
    map: M,
    reduce: R,
) -> U
where
    T: Sync,
    U: Send,
    M: Fn(&T) -> U + Send + Sync,
    R: Fn(U, U) -> U + Send + Sync,
{
    assert!(
        items.len() >= 2,
        "map_reduce requires at least two elements"
    );

    let chunks = split_range(items.len(), scheduler.size(), MIN_CHUNK_REDUCE);
    if chunks.len() <= 1 {
        let mut acc = reduce(map(init), map(&items[0]));
        for item in &items[1..] {
            acc = reduce(acc, map(item));
        }
        return acc;
    }

    let mut partials: Vec<Option<U>> = (0..chunks.len()).map(|_| None).collect();
    let slots = SlicePtr::new(&mut partials);
    run_chunked(scheduler, &chunks, |range, index| {
        // SAFETY: one slot per chunk, and the partials vector outlives the
        // wait inside run_chunked.
        let slot = unsafe { slots.chunk_mut(index..index + 1) };
        let chunk = &items[range];
        let mut acc = map(&chunk[0]);
        for item in &chunk[1..] {
            acc = reduce(acc, map(item));
        }
        slot[0] = Some(acc);
    });

    let mut partials = partials.into_iter().map(|partial| {
        partial.unwrap_or_else(|| panic!("scheduler stopped before the chunk completed"))
    });
    let first = partials.next().expect("at least one chunk exists");
    let mut acc = reduce(map(init), first);
    for partial in partials {
        acc = reduce(acc, partial);
    }
    acc
}

/// Counts the elements satisfying `pred`.
pub fn count_if<T, P>(items: &[T], pred: P) -> usize
where
    T: Sync,
    P: Fn(&T) -> bool + Send + Sync,
{
    count_if_in(&get_task_scheduler(), items, pred)
}

/// [`count_if`] on an explicit scheduler.
pub fn count_if_in<T, P>(scheduler: &TaskScheduler, items: &[T], pred: P) -> usize
where
    T: Sync,
    P: Fn(&T) -> bool + Send + Sync,
{
    let chunks = split_range(items.len(), scheduler.size(), MIN_CHUNK_REDUCE);
    if chunks.len() <= 1 {
        return items.iter().filter(|item| pred(item)).count();
    }

    let mut partials: Vec<usize> = vec![0; chunks.len()];
    let slots = SlicePtr::new(&mut partials);
    run_chunked(scheduler, &chunks, |range, index| {
        // SAFETY: one slot per chunk, and the partials vector outlives the
        // wait inside run_chunked.
        let slot = unsafe { slots.chunk_mut(index..index + 1) };
        slot[0] = items[range].iter().filter(|item| pred(item)).count();
    });

    partials.iter().sum()
}

/// Counts the elements equal to `value`.
pub fn count<T>(items: &[T], value: &T) -> usize
where
    T: PartialEq + Sync,
{
    count_in(&get_task_scheduler(), items, value)
}

/// [`count`] on an explicit scheduler.
pub fn count_in<T>(scheduler: &TaskScheduler, items: &[T], value: &T) -> usize
where
    T: PartialEq + Sync,
{
    count_if_in(scheduler, items, |item| item == value)
}

/// Position of the first minimum element, or `None` for an empty range.
pub fn min_element<T>(items: &[T]) -> Option<usize>
where
    T: Ord + Sync,
{
    min_element_by_in(&get_task_scheduler(), items, T::cmp)
}

/// [`min_element`] with a custom comparison.
pub fn min_element_by<T, C>(items: &[T], compare: C) -> Option<usize>
where
    T: Sync,
    C: Fn(&T, &T) -> Ordering + Send + Sync,
{
    min_element_by_in(&get_task_scheduler(), items, compare)
}

/// [`min_element_by`] on an explicit scheduler.
pub fn min_element_by_in<T, C>(scheduler: &TaskScheduler, items: &[T], compare: C) -> Option<usize>
where
    T: Sync,
    C: Fn(&T, &T) -> Ordering + Send + Sync,
{
    extreme_element_in(scheduler, items, |candidate, best| {
        compare(candidate, best) == Ordering::Less
    })
}

/// Position of the first maximum element, or `None` for an empty range.
pub fn max_element<T>(items: &[T]) -> Option<usize>
where
    T: Ord + Sync,
{
    max_element_by_in(&get_task_scheduler(), items, T::cmp)
}

/// [`max_element`] with a custom comparison.
pub fn max_element_by<T, C>(items: &[T], compare: C) -> Option<usize>
where
    T: Sync,
    C: Fn(&T, &T) -> Ordering + Send + Sync,
{
    max_element_by_in(&get_task_scheduler(), items, compare)
}

/// [`max_element_by`] on an explicit scheduler.
pub fn max_element_by_in<T, C>(scheduler: &TaskScheduler, items: &[T], compare: C) -> Option<usize>
where
    T: Sync,
    C: Fn(&T, &T) -> Ordering + Send + Sync,
{
    extreme_element_in(scheduler, items, |candidate, best| {
        compare(candidate, best) == Ordering::Greater
    })
}

/// Shared machinery for min/max: `beats(candidate, best)` decides strict
/// improvement, so ties resolve to the earliest position, matching the
/// serial algorithms.
fn extreme_element_in<T, B>(scheduler: &TaskScheduler, items: &[T], beats: B) -> Option<usize>
where
    T: Sync,
    B: Fn(&T, &T) -> bool + Send + Sync,
{
    if items.is_empty() {
        return None;
    }

    let serial_best = |range: std::ops::Range<usize>| -> usize {
        let mut best = range.start;
        for index in range.skip(1) {
            if beats(&items[index], &items[best]) {
                best = index;
            }
        }
        best
    };

    let chunks = split_range(items.len(), scheduler.size(), MIN_CHUNK_REDUCE);
    if chunks.len() <= 1 {
        return Some(serial_best(0..items.len()));
    }

    let mut partials: Vec<usize> = vec![0; chunks.len()];
    let slots = SlicePtr::new(&mut partials);
    run_chunked(scheduler, &chunks, |range, index| {
        // SAFETY: one slot per chunk, and the partials vector outlives the
        // wait inside run_chunked.
        let slot = unsafe { slots.chunk_mut(index..index + 1) };
        slot[0] = serial_best(range);
    });

    let mut best = partials[0];
    for &candidate in &partials[1..] {
        // Chunks are visited in position order, so a strict comparison
        // again keeps the earliest winner.
        if beats(&items[candidate], &items[best]) {
            best = candidate;
        }
    }
    Some(best)
}
