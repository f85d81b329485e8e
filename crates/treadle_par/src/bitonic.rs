// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Opt-in bitonic sort. A sorting network rather than a comparison sort:
//! predictable access patterns, heavy on compare-exchange, and only worth
//! it for large inputs - the partition floor here is far higher than the
//! merge sort's. [`crate::sort`] remains the default choice.

use treadle::{TaskScheduler, get_task_scheduler, invoke_tasks};

use crate::{MIN_CHUNK_BITONIC, SlicePtr};

/// Sorts the range with a parallel bitonic network. Not stable.
pub fn bitonic_sort<T>(items: &mut [T])
where
    T: Ord + Send + 'static,
{
    bitonic_sort_in(&get_task_scheduler(), items);
}

/// [`bitonic_sort`] on an explicit scheduler.
pub fn bitonic_sort_in<T>(scheduler: &TaskScheduler, items: &mut [T])
where
    T: Ord + Send + 'static,
{
    if items.len() <= 1 {
        return;
    }
    let base = SlicePtr::new(items);
    // The recursion below blocks on every sub-task it spawns (the task
    // groups are awaited re-entrantly), so all of the raw accesses through
    // `base` have finished when this call returns.
    par_bitonic_sort(scheduler, base, 0, items.len(), true);
}

fn par_bitonic_sort<T>(
    scheduler: &TaskScheduler,
    base: SlicePtr<T>,
    start: usize,
    end: usize,
    ascending: bool,
) where
    T: Ord + Send + 'static,
{
    let len = end - start;
    if len <= MIN_CHUNK_BITONIC {
        // SAFETY: the recursion hands out pairwise disjoint ranges, and the
        // caller of the recursion root keeps the data alive until every
        // spawned task completed.
        let chunk = unsafe { base.chunk_mut(start..end) };
        bitonic_sort_serial(chunk, ascending);
        return;
    }

    // Sort the halves in opposite directions; the whole range is then
    // bitonic and a merge finishes the job.
    let mid = start + len / 2;
    let first_half = scheduler.clone();
    let second_half = scheduler.clone();
    invoke_tasks(
        scheduler,
        (
            move || par_bitonic_sort(&first_half, base, start, mid, !ascending),
            move || par_bitonic_sort(&second_half, base, mid, end, ascending),
        ),
    );
    par_bitonic_merge(scheduler, base, start, end, ascending);
}

fn par_bitonic_merge<T>(
    scheduler: &TaskScheduler,
    base: SlicePtr<T>,
    start: usize,
    end: usize,
    ascending: bool,
) where
    T: Ord + Send + 'static,
{
    let len = end - start;
    if len <= MIN_CHUNK_BITONIC {
        // SAFETY: as in `par_bitonic_sort`: disjoint range, data pinned by
        // the blocking recursion.
        let chunk = unsafe { base.chunk_mut(start..end) };
        bitonic_merge_serial(chunk, ascending);
        return;
    }

    let mid = greatest_power_of_two_less_than(len);
    {
        // SAFETY: this whole range is exclusively ours until the sub-merges
        // are spawned below.
        let chunk = unsafe { base.chunk_mut(start..end) };
        for offset in 0..(len - mid) {
            compare_exchange(chunk, offset, offset + mid, ascending);
        }
    }

    let left = scheduler.clone();
    let right = scheduler.clone();
    invoke_tasks(
        scheduler,
        (
            move || par_bitonic_merge(&left, base, start, start + mid, ascending),
            move || par_bitonic_merge(&right, base, start + mid, end, ascending),
        ),
    );
}

fn bitonic_sort_serial<T: Ord>(chunk: &mut [T], ascending: bool) {
    let len = chunk.len();
    if len <= 1 {
        return;
    }
    let mid = len / 2;
    bitonic_sort_serial(&mut chunk[..mid], !ascending);
    bitonic_sort_serial(&mut chunk[mid..], ascending);
    bitonic_merge_serial(chunk, ascending);
}

/// Merges a bitonic range into a sorted one. Handles arbitrary lengths by
/// splitting at the greatest power of two below the length.
fn bitonic_merge_serial<T: Ord>(chunk: &mut [T], ascending: bool) {
    let len = chunk.len();
    if len <= 1 {
        return;
    }
    let mid = greatest_power_of_two_less_than(len);
    for offset in 0..(len - mid) {
        compare_exchange(chunk, offset, offset + mid, ascending);
    }
    bitonic_merge_serial(&mut chunk[..mid], ascending);
    bitonic_merge_serial(&mut chunk[mid..], ascending);
}

fn compare_exchange<T: Ord>(chunk: &mut [T], left: usize, right: usize, ascending: bool) {
    if (chunk[right] < chunk[left]) == ascending {
        chunk.swap(left, right);
    }
}

fn greatest_power_of_two_less_than(len: usize) -> usize {
    debug_assert!(len > 1);
    len.next_power_of_two() / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_of_two_split_points() {
        assert_eq!(greatest_power_of_two_less_than(2), 1);
        assert_eq!(greatest_power_of_two_less_than(3), 2);
        assert_eq!(greatest_power_of_two_less_than(4), 2);
        assert_eq!(greatest_power_of_two_less_than(5), 4);
        assert_eq!(greatest_power_of_two_less_than(1024), 512);
        assert_eq!(greatest_power_of_two_less_than(1025), 1024);
    }

    #[test]
    fn serial_network_sorts_arbitrary_lengths() {
        for len in [2_usize, 3, 5, 8, 13, 64, 100] {
            let mut data: Vec<u64> = (0..len as u64).map(|n| (n * 7919) % 101).collect();
            let mut expected = data.clone();
            expected.sort_unstable();

            bitonic_sort_serial(&mut data, true);
            assert_eq!(data, expected, "length {len}");
        }
    }

    #[test]
    fn descending_direction_reverses() {
        let mut data = vec![3_u32, 1, 4, 1, 5, 9, 2, 6];
        bitonic_sort_serial(&mut data, false);
        assert_eq!(data, [9, 6, 5, 4, 3, 2, 1, 1]);
    }
}
