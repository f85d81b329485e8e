// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Chunk-task submission. The algorithms in this crate borrow their inputs,
//! while the scheduler's queues require `'static` tasks; the bridge is the
//! lifetime erasure in [`submit_borrowed`], justified by the fact that every
//! algorithm waits for all of its chunk tasks before returning.

use std::mem;
use std::ops::Range;
use std::slice;

use treadle::{SharedLatch, TaskScheduler, schedule_task};

/// Submits a borrowed closure as a pool task tied to `latch`.
///
/// # Safety
///
/// The caller must not return (or otherwise end lifetime `'a`) until
/// `latch` has been satisfied. The latch is notified exactly once per
/// submitted task - when its body completes, or when the task is destroyed
/// unexecuted - so waiting on it bounds the closure's lifetime from below.
pub(crate) unsafe fn submit_borrowed<'a, F>(
    scheduler: &TaskScheduler,
    latch: &SharedLatch,
    func: F,
) -> bool
where
    F: FnOnce() + Send + 'a,
{
    let task: Box<dyn FnOnce() + Send + 'a> = Box::new(func);
    // SAFETY: the caller guarantees to outwait `latch`, and the scheduler
    // guarantees the latch is notified only after the task body finished or
    // the task was destroyed. Either way the closure is gone before `'a`
    // ends, so promoting it to `'static` cannot let a borrow dangle.
    let task: Box<dyn FnOnce() + Send + 'static> = unsafe { mem::transmute(task) };
    schedule_task(latch.clone(), task, scheduler)
}

/// Runs `func(chunk_range, chunk_index)` as one pool task per chunk and
/// waits for all of them.
///
/// # Panics
///
/// Panics - after every admitted chunk has completed - if any chunk could
/// not be admitted; partial execution of a range algorithm is a fatal
/// contract violation, not a recoverable state.
pub(crate) fn run_chunked<'a, F>(scheduler: &TaskScheduler, chunks: &[Range<usize>], func: F)
where
    F: Fn(Range<usize>, usize) + Send + Sync + 'a,
{
    run_chunked_from(scheduler, chunks, 0, func);
}

/// [`run_chunked`], skipping the first `start_pos` chunks (the chunk index
/// passed to `func` is the absolute one).
pub(crate) fn run_chunked_from<'a, F>(
    scheduler: &TaskScheduler,
    chunks: &[Range<usize>],
    start_pos: usize,
    func: F,
) where
    F: Fn(Range<usize>, usize) + Send + Sync + 'a,
{
    let chunks = &chunks[start_pos..];
    if chunks.is_empty() {
        return;
    }

    let latch = SharedLatch::with_count(chunks.len());
    let shared_func = &func;
    let mut rejected = 0_usize;
    for (offset, chunk) in chunks.iter().cloned().enumerate() {
        let index = start_pos + offset;
        // SAFETY: `wait_for` below does not return before the latch is
        // satisfied, which covers every submitted task; `func` and the
        // borrowed chunk data therefore outlive all uses.
        let admitted =
            unsafe { submit_borrowed(scheduler, &latch, move || shared_func(chunk, index)) };
        if !admitted {
            // The rejected task was destroyed, which already notified the
            // latch; only the final verdict is left to report.
            rejected += 1;
        }
    }

    scheduler.wait_for(&latch);
    assert!(rejected == 0, "unable to add task");
}

/// A length-erased pointer to a mutable slice, shared between chunk tasks.
/// Copyable so each task can capture its own; soundness comes from the
/// tasks touching pairwise disjoint index ranges.
pub(crate) struct SlicePtr<T> {
    data: *mut T,
    len: usize,
}

impl<T> Clone for SlicePtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SlicePtr<T> {}

// SAFETY: the pointer is only dereferenced through `chunk_mut`, whose
// callers guarantee disjointness; with disjoint chunks this is no more than
// a scoped split_at_mut performed across threads, which requires T: Send.
unsafe impl<T: Send> Send for SlicePtr<T> {}
// SAFETY: as above - shared references to the wrapper only hand out
// disjoint mutable chunks.
unsafe impl<T: Send> Sync for SlicePtr<T> {}

impl<T> SlicePtr<T> {
    pub(crate) fn new(slice: &mut [T]) -> Self {
        Self {
            data: slice.as_mut_ptr(),
            len: slice.len(),
        }
    }

    /// Reborrows one chunk of the underlying slice.
    ///
    /// # Safety
    ///
    /// `range` must lie within the original slice, the underlying storage
    /// must still be live, and no other live borrow (from this wrapper or
    /// elsewhere) may overlap `range`.
    pub(crate) unsafe fn chunk_mut<'a>(&self, range: Range<usize>) -> &'a mut [T] {
        debug_assert!(range.start <= range.end && range.end <= self.len);
        // SAFETY: in-bounds per the assertion above; exclusivity is the
        // caller's obligation.
        unsafe { slice::from_raw_parts_mut(self.data.add(range.start), range.len()) }
    }
}

impl<T> std::fmt::Debug for SlicePtr<T> {
    #[cfg_attr(test, mutants::skip)] // We have no contract to test here - can return anything.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlicePtr").field("len", &self.len).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn run_chunked_visits_every_chunk_once() {
        let scheduler = TaskScheduler::builder().with_thread_count(2).build();
        let chunks = vec![0..3, 3..6, 6..8];
        let visited = AtomicUsize::new(0);
        let total = AtomicUsize::new(0);

        run_chunked(&scheduler, &chunks, |range, index| {
            _ = visited.fetch_add(1, Ordering::AcqRel);
            _ = total.fetch_add(range.len() * (index + 1), Ordering::AcqRel);
        });

        assert_eq!(visited.load(Ordering::Acquire), 3);
        assert_eq!(total.load(Ordering::Acquire), 3 + 6 + 6);
        scheduler.stop(true);
    }

    #[test]
    fn run_chunked_from_skips_leading_chunks() {
        let scheduler = TaskScheduler::builder().with_thread_count(2).build();
        let chunks = vec![0..4, 4..8, 8..12];
        let first_index = AtomicUsize::new(usize::MAX);

        run_chunked_from(&scheduler, &chunks, 1, |_range, index| {
            _ = first_index.fetch_min(index, Ordering::AcqRel);
        });

        assert_eq!(first_index.load(Ordering::Acquire), 1);
        scheduler.stop(true);
    }

    #[test]
    fn slice_ptr_hands_out_disjoint_chunks() {
        let mut data = vec![0_u32; 8];
        let ptr = SlicePtr::new(&mut data);

        // SAFETY: the two ranges are disjoint and in bounds, and `data`
        // outlives both borrows.
        let (left, right) = unsafe { (ptr.chunk_mut(0..4), ptr.chunk_mut(4..8)) };
        left.fill(1);
        right.fill(2);

        assert_eq!(data, [1, 1, 1, 1, 2, 2, 2, 2]);
    }
}
