// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cmp::Ordering;
use std::mem;
use std::ptr;

use treadle::{FutureResult, SharedLatch, TaskScheduler, get_task_scheduler, make_future_result};

use crate::{MIN_CHUNK_SORT, SlicePtr, split_range};

/// A chunk of the range being sorted, identified by position so it can
/// travel through future results without carrying a borrow.
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
}

/// Sorts the range in parallel. Not stable; equal elements may be
/// reordered. The serial fallback and the chunk sorts use the standard
/// library's unstable sort.
pub fn sort<T>(items: &mut [T])
where
    T: Ord + Send + 'static,
{
    sort_in(&get_task_scheduler(), items);
}

/// [`sort`] on an explicit scheduler.
pub fn sort_in<T>(scheduler: &TaskScheduler, items: &mut [T])
where
    T: Ord + Send + 'static,
{
    sort_by_in(scheduler, items, T::cmp);
}

/// [`sort`] with a caller-supplied comparison.
pub fn sort_by<T, C>(items: &mut [T], compare: C)
where
    T: Send + 'static,
    C: Fn(&T, &T) -> Ordering + Sync,
{
    sort_by_in(&get_task_scheduler(), items, compare);
}

/// [`sort_by`] on an explicit scheduler.
pub fn sort_by_in<T, C>(scheduler: &TaskScheduler, items: &mut [T], compare: C)
where
    T: Send + 'static,
    C: Fn(&T, &T) -> Ordering + Sync,
{
    parallel_sort_by(scheduler, items, &compare, false);
}

/// Stable parallel sort: equal elements keep their relative order.
pub fn stable_sort<T>(items: &mut [T])
where
    T: Ord + Send + 'static,
{
    stable_sort_in(&get_task_scheduler(), items);
}

/// [`stable_sort`] on an explicit scheduler.
pub fn stable_sort_in<T>(scheduler: &TaskScheduler, items: &mut [T])
where
    T: Ord + Send + 'static,
{
    stable_sort_by_in(scheduler, items, T::cmp);
}

/// [`stable_sort`] with a caller-supplied comparison.
pub fn stable_sort_by<T, C>(items: &mut [T], compare: C)
where
    T: Send + 'static,
    C: Fn(&T, &T) -> Ordering + Sync,
{
    stable_sort_by_in(&get_task_scheduler(), items, compare);
}

/// [`stable_sort_by`] on an explicit scheduler.
pub fn stable_sort_by_in<T, C>(scheduler: &TaskScheduler, items: &mut [T], compare: C)
where
    T: Send + 'static,
    C: Fn(&T, &T) -> Ordering + Sync,
{
    parallel_sort_by(scheduler, items, &compare, true);
}

/// Partition, sort every chunk as its own future, then merge adjacent runs
/// pairwise through chained continuations until one sorted run remains.
/// The merge itself preserves the order of equal elements, so stability is
/// decided solely by the per-chunk sort.
fn parallel_sort_by<T, C>(scheduler: &TaskScheduler, items: &mut [T], compare: &C, stable: bool)
where
    T: Send + 'static,
    C: Fn(&T, &T) -> Ordering + Sync + ?Sized,
{
    let chunks = split_range(items.len(), scheduler.size() * 2, MIN_CHUNK_SORT);
    if chunks.len() <= 1 {
        serial_sort(items, compare, stable);
        return;
    }

    let erased: &(dyn Fn(&T, &T) -> Ordering + Sync) = &|a, b| compare(a, b);
    // SAFETY: every task spawned below either runs to completion or is
    // destroyed before the activity latch settles, and this function does
    // not return before waiting on that latch; the comparator therefore
    // outlives all uses despite the erased borrow lifetime.
    let compare_shared: &'static (dyn Fn(&T, &T) -> Ordering + Sync) =
        unsafe { mem::transmute(erased) };
    let base = SlicePtr::new(items);

    // One slot per chunk sort plus one per merge. Each slot is released by
    // a guard owned by its closure, so it fires whether the closure runs,
    // panics, or is destroyed unexecuted.
    let activity = SharedLatch::with_count(chunks.len() + (chunks.len() - 1));

    let mut round: Vec<FutureResult<Span>> = chunks
        .iter()
        .map(|range| {
            let span = Span {
                start: range.start,
                end: range.end,
            };
            let slot = scopeguard::guard(activity.clone(), |latch| latch.notify());
            make_future_result(scheduler, move || {
                let _slot = slot;
                // SAFETY: chunk spans are pairwise disjoint, and the data
                // outlives the activity wait below.
                let chunk = unsafe { base.chunk_mut(span.start..span.end) };
                if stable {
                    chunk.sort_by(|a, b| compare_shared(a, b));
                } else {
                    chunk.sort_unstable_by(|a, b| compare_shared(a, b));
                }
                span
            })
        })
        .collect();

    while round.len() > 1 {
        let mut next_round = Vec::with_capacity(round.len().div_ceil(2));
        let mut pending = round.into_iter();
        while let Some(left) = pending.next() {
            match pending.next() {
                Some(right) => {
                    let slot = scopeguard::guard(activity.clone(), |latch| latch.notify());
                    next_round.push(left.next_result(move |lhs: Span| {
                        let _slot = slot;
                        // Blocking on the right-hand side is fine here: the
                        // continuation runs inside a scheduler task, where
                        // waits are re-entrant.
                        let rhs = right.get()?;
                        // SAFETY: the two spans are adjacent and disjoint
                        // from every other live chunk at this point in the
                        // merge tree, and the data outlives the activity
                        // wait below.
                        let joined = unsafe { base.chunk_mut(lhs.start..rhs.end) };
                        merge_adjacent(joined, lhs.end - lhs.start, compare_shared);
                        Ok(Span {
                            start: lhs.start,
                            end: rhs.end,
                        })
                    }));
                }
                None => next_round.push(left),
            }
        }
        round = next_round;
    }

    let merged = round.pop().expect("reduction leaves exactly one future");
    merged.wait();
    // An error settles the root early while sibling subtrees may still be
    // sorting; the borrowed data stays pinned until all activity ceased.
    scheduler.wait_for(&activity);
    if let Err(error) = merged.get() {
        panic!("parallel sort failed: {error}");
    }
}

fn serial_sort<T, C>(items: &mut [T], compare: &C, stable: bool)
where
    C: Fn(&T, &T) -> Ordering + ?Sized,
{
    if stable {
        items.sort_by(|a, b| compare(a, b));
    } else {
        items.sort_unstable_by(|a, b| compare(a, b));
    }
}

/// Merges the two sorted runs `joined[..mid]` and `joined[mid..]` in place.
///
/// The left run is moved out into a scratch buffer, then both runs are
/// merged forward into `joined`. Equal elements are taken from the left run
/// first, which preserves their relative order. A panicking comparator
/// leaves `joined` holding every element exactly once (in unspecified
/// order): the hole guard copies the unconsumed scratch remainder back.
fn merge_adjacent<T>(joined: &mut [T], mid: usize, compare: &(dyn Fn(&T, &T) -> Ordering + Sync)) {
    let len = joined.len();
    if mid == 0 || mid == len {
        return;
    }
    // Already ordered across the boundary; the common case for presorted
    // data.
    if compare(&joined[mid - 1], &joined[mid]) != Ordering::Greater {
        return;
    }

    // Scratch space for the left run. Never has its length set: it only
    // ever holds bitwise copies whose ownership is tracked by the hole.
    let mut scratch: Vec<T> = Vec::with_capacity(mid);
    let base = joined.as_mut_ptr();

    /// Tracks the not-yet-merged remainder of the scratch buffer. Dropping
    /// the hole restores that remainder into the destination, which makes
    /// the merge leave a valid (if unsorted) slice even when the comparator
    /// panics.
    struct MergeHole<T> {
        scratch: *mut T,
        scratch_end: *mut T,
        dest: *mut T,
    }

    impl<T> Drop for MergeHole<T> {
        fn drop(&mut self) {
            // SAFETY: `dest..` has exactly the unconsumed scratch elements'
            // worth of unfilled slots remaining (the merge advances `dest`
            // once per element it consumes from either side).
            unsafe {
                #[expect(clippy::cast_sign_loss, reason = "scratch_end never precedes scratch")]
                let remaining = self.scratch_end.offset_from(self.scratch) as usize;
                ptr::copy_nonoverlapping(self.scratch, self.dest, remaining);
            }
        }
    }

    // SAFETY: `scratch` has capacity for `mid` elements and `joined` holds
    // at least `mid`; after the copy the left run's slots in `joined` are
    // treated as uninitialised holes until the merge refills them.
    unsafe {
        ptr::copy_nonoverlapping(base, scratch.as_mut_ptr(), mid);
    }

    let mut hole = MergeHole {
        scratch: scratch.as_mut_ptr(),
        // SAFETY: `mid` is within the scratch allocation by construction.
        scratch_end: unsafe { scratch.as_mut_ptr().add(mid) },
        dest: base,
    };
    // SAFETY: `mid <= len`, both within the `joined` allocation.
    let mut right = unsafe { base.add(mid) };
    let right_end = unsafe { base.add(len) };

    while hole.scratch < hole.scratch_end && right < right_end {
        // SAFETY: both pointers are in bounds and point at live elements;
        // each element is moved out exactly once, with `dest` advancing in
        // lockstep with the consumed count.
        unsafe {
            if compare(&*right, &*hole.scratch) == Ordering::Less {
                ptr::copy_nonoverlapping(right, hole.dest, 1);
                right = right.add(1);
            } else {
                ptr::copy_nonoverlapping(hole.scratch, hole.dest, 1);
                hole.scratch = hole.scratch.add(1);
            }
            hole.dest = hole.dest.add(1);
        }
    }

    // The hole's drop moves any scratch remainder into place; a right-run
    // remainder is already in position.
    drop(hole);
}
