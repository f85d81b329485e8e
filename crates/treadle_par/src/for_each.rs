// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ops::Range;

use treadle::{TaskScheduler, get_task_scheduler};

use crate::{MIN_CHUNK_FOR_EACH, SlicePtr, run_chunked, split_range};

/// Applies `func` to every element, one chunk of the range per pool task.
/// No ordering between elements is guaranteed.
pub fn for_each<T, F>(items: &[T], func: F)
where
    T: Sync,
    F: Fn(&T) + Send + Sync,
{
    for_each_in(&get_task_scheduler(), items, func);
}

/// [`for_each`] on an explicit scheduler.
pub fn for_each_in<T, F>(scheduler: &TaskScheduler, items: &[T], func: F)
where
    T: Sync,
    F: Fn(&T) + Send + Sync,
{
    let chunks = split_range(items.len(), scheduler.size(), MIN_CHUNK_FOR_EACH);
    if chunks.len() <= 1 {
        items.iter().for_each(func);
        return;
    }
    run_chunked(scheduler, &chunks, |range, _index| {
        for item in &items[range] {
            func(item);
        }
    });
}

/// Mutating [`for_each`]: applies `func` to every element in place.
pub fn for_each_mut<T, F>(items: &mut [T], func: F)
where
    T: Send,
    F: Fn(&mut T) + Send + Sync,
{
    for_each_mut_in(&get_task_scheduler(), items, func);
}

/// [`for_each_mut`] on an explicit scheduler.
pub fn for_each_mut_in<T, F>(scheduler: &TaskScheduler, items: &mut [T], func: F)
where
    T: Send,
    F: Fn(&mut T) + Send + Sync,
{
    let chunks = split_range(items.len(), scheduler.size(), MIN_CHUNK_FOR_EACH);
    if chunks.len() <= 1 {
        items.iter_mut().for_each(func);
        return;
    }
    let base = SlicePtr::new(items);
    run_chunked(scheduler, &chunks, |range, _index| {
        // SAFETY: chunks are pairwise disjoint and the slice outlives the
        // wait inside run_chunked.
        let chunk = unsafe { base.chunk_mut(range) };
        for item in chunk {
            func(item);
        }
    });
}

/// Calls `func` with every index of `indices`, chunked across the pool.
pub fn for_each_index<F>(indices: Range<usize>, func: F)
where
    F: Fn(usize) + Send + Sync,
{
    for_each_index_in(&get_task_scheduler(), indices, func);
}

/// [`for_each_index`] on an explicit scheduler.
pub fn for_each_index_in<F>(scheduler: &TaskScheduler, indices: Range<usize>, func: F)
where
    F: Fn(usize) + Send + Sync,
{
    let chunks = split_range(indices.len(), scheduler.size(), MIN_CHUNK_FOR_EACH);
    if chunks.len() <= 1 {
        indices.for_each(func);
        return;
    }
    let first = indices.start;
    run_chunked(scheduler, &chunks, |range, _index| {
        for offset in range {
            func(first + offset);
        }
    });
}

/// Overwrites every element with a clone of `value`.
pub fn fill<T>(items: &mut [T], value: &T)
where
    T: Clone + Send + Sync,
{
    fill_in(&get_task_scheduler(), items, value);
}

/// [`fill`] on an explicit scheduler.
pub fn fill_in<T>(scheduler: &TaskScheduler, items: &mut [T], value: &T)
where
    T: Clone + Send + Sync,
{
    for_each_mut_in(scheduler, items, |item| item.clone_from(value));
}

/// Hands each chunk of the partition to `func` as one contiguous mutable
/// view; there is no reduction step.
pub fn chunked_for_each<T, F>(items: &mut [T], func: F)
where
    T: Send,
    F: Fn(&mut [T]) + Send + Sync,
{
    chunked_for_each_in(&get_task_scheduler(), items, func);
}

/// [`chunked_for_each`] on an explicit scheduler.
pub fn chunked_for_each_in<T, F>(scheduler: &TaskScheduler, items: &mut [T], func: F)
where
    T: Send,
    F: Fn(&mut [T]) + Send + Sync,
{
    chunked_for_each_pos_in(scheduler, items, |chunk, _index| func(chunk));
}

/// [`chunked_for_each`], with the chunk's position in the partition passed
/// alongside the view.
pub fn chunked_for_each_pos<T, F>(items: &mut [T], func: F)
where
    T: Send,
    F: Fn(&mut [T], usize) + Send + Sync,
{
    chunked_for_each_pos_in(&get_task_scheduler(), items, func);
}

/// [`chunked_for_each_pos`] on an explicit scheduler.
pub fn chunked_for_each_pos_in<T, F>(scheduler: &TaskScheduler, items: &mut [T], func: F)
where
    T: Send,
    F: Fn(&mut [T], usize) + Send + Sync,
{
    if items.is_empty() {
        return;
    }
    let chunks = split_range(items.len(), scheduler.size(), MIN_CHUNK_FOR_EACH);
    if chunks.len() <= 1 {
        func(items, 0);
        return;
    }
    let base = SlicePtr::new(items);
    run_chunked(scheduler, &chunks, |range, index| {
        // SAFETY: chunks are pairwise disjoint and the slice outlives the
        // wait inside run_chunked.
        let chunk = unsafe { base.chunk_mut(range) };
        func(chunk, index);
    });
}
