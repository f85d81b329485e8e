// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::atomic::{AtomicUsize, Ordering};

use treadle::TaskScheduler;
use treadle_par as par;
use treadle_testing::execute_or_abandon;

fn pool(threads: usize) -> TaskScheduler {
    TaskScheduler::builder().with_thread_count(threads).build()
}

/// Deterministic pseudo-random data, enough to defeat presortedness.
fn shuffled(len: usize) -> Vec<u64> {
    let mut state = 0x2545_f491_4f6c_dd1d_u64;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        })
        .collect()
}

#[test]
fn for_each_visits_every_element() {
    let scheduler = pool(4);
    let items: Vec<u64> = (0..10_000).collect();
    let sum = AtomicUsize::new(0);

    par::for_each_in(&scheduler, &items, |item| {
        _ = sum.fetch_add(*item as usize, Ordering::AcqRel);
    });

    assert_eq!(sum.load(Ordering::Acquire), 10_000 * 9_999 / 2);
    scheduler.stop(true);
}

#[test]
fn for_each_mut_updates_in_place() {
    let scheduler = pool(4);
    let mut items: Vec<u64> = (0..5_000).collect();

    par::for_each_mut_in(&scheduler, &mut items, |item| *item *= 2);

    assert!(items.iter().enumerate().all(|(n, item)| *item == 2 * n as u64));
    scheduler.stop(true);
}

#[test]
fn for_each_index_covers_the_whole_range() {
    let scheduler = pool(4);
    let seen: Vec<AtomicUsize> = (0..2_000).map(|_| AtomicUsize::new(0)).collect();

    par::for_each_index_in(&scheduler, 0..seen.len(), |index| {
        _ = seen[index].fetch_add(1, Ordering::AcqRel);
    });

    assert!(seen.iter().all(|count| count.load(Ordering::Acquire) == 1));
    scheduler.stop(true);
}

#[test]
fn fill_overwrites_everything() {
    let scheduler = pool(2);
    let mut items = vec![0_u32; 4_000];
    par::fill_in(&scheduler, &mut items, &7);
    assert!(items.iter().all(|item| *item == 7));
    scheduler.stop(true);
}

#[test]
fn chunked_for_each_partitions_without_overlap() {
    let scheduler = pool(4);
    let mut items = vec![0_u8; 10_000];
    let chunk_count = AtomicUsize::new(0);

    par::chunked_for_each_pos_in(&scheduler, &mut items, |chunk, _pos| {
        _ = chunk_count.fetch_add(1, Ordering::AcqRel);
        for item in chunk {
            *item += 1;
        }
    });

    // Every element touched exactly once proves the chunks tile the range.
    assert!(items.iter().all(|item| *item == 1));
    assert!(chunk_count.load(Ordering::Acquire) >= 2);
    scheduler.stop(true);
}

#[test]
fn transform_round_trips_through_its_inverse() {
    let scheduler = pool(4);
    let input: Vec<i64> = (0..4_096).collect();
    let mut encoded = vec![0_i64; input.len()];
    let mut decoded = vec![0_i64; input.len()];

    par::transform_in(&scheduler, &input, &mut encoded, |x| x * 3 + 1);
    par::transform_in(&scheduler, &encoded, &mut decoded, |x| (x - 1) / 3);

    assert_eq!(decoded, input);
    scheduler.stop(true);
}

#[test]
fn transform2_zips_both_inputs() {
    let scheduler = pool(4);
    let lhs: Vec<u64> = (0..2_048).collect();
    let rhs: Vec<u64> = (0..2_048).map(|x| x * 10).collect();
    let mut output = vec![0_u64; lhs.len()];

    par::transform2_in(&scheduler, &lhs, &rhs, &mut output, |a, b| a + b);

    assert!(output.iter().enumerate().all(|(n, out)| *out == n as u64 * 11));
    scheduler.stop(true);
}

#[test]
fn reduce_of_eight_ones_is_eight() {
    let scheduler = pool(4);
    let ones = [1_u64; 8];
    assert_eq!(par::reduce_in(&scheduler, &ones, 0, |a, b| a + b), 8);
    scheduler.stop(true);
}

#[test]
fn reduce_matches_the_serial_fold() {
    let scheduler = pool(4);
    let items = shuffled(20_000)
        .into_iter()
        .map(|x| x % 1_000)
        .collect::<Vec<_>>();

    let parallel = par::reduce_in(&scheduler, &items, 0, |a, b| a + b);
    let serial: u64 = items.iter().sum();
    assert_eq!(parallel, serial);
    scheduler.stop(true);
}

#[test]
fn reduce_boundaries() {
    let scheduler = pool(4);
    let empty: [u64; 0] = [];
    assert_eq!(par::reduce_in(&scheduler, &empty, 5, |a, b| a + b), 5);
    assert_eq!(par::reduce_in(&scheduler, &[3_u64], 5, |a, b| a + b), 8);
    scheduler.stop(true);
}

#[test]
fn map_reduce_counts_via_mapping() {
    let scheduler = pool(4);
    let items: Vec<i32> = (1..=1_000).collect();

    // Map everything to 1 and sum: counts the elements plus the init.
    let total = par::map_reduce_in(&scheduler, &items, &0, |_x| 1_u64, |a, b| a + b);
    assert_eq!(total, 1_001);
    scheduler.stop(true);
}

#[test]
#[should_panic(expected = "at least two")]
fn map_reduce_rejects_tiny_ranges() {
    let scheduler = pool(2);
    _ = par::map_reduce_in(&scheduler, &[1_u32], &0, |x| *x, |a, b| a + b);
}

#[test]
fn count_and_count_if() {
    let scheduler = pool(4);
    let items: Vec<u32> = (0..10_000).map(|x| x % 10).collect();

    assert_eq!(par::count_in(&scheduler, &items, &3), 1_000);
    assert_eq!(
        par::count_if_in(&scheduler, &items, |x| x % 2 == 0),
        5_000
    );
    scheduler.stop(true);
}

#[test]
fn min_and_max_element_find_the_extremes() {
    let scheduler = pool(4);
    let mut items: Vec<i64> = shuffled(9_999).into_iter().map(|x| (x % 100_000) as i64).collect();
    items[1_234] = -7;
    items[7_777] = 1_000_000;

    assert_eq!(
        par::min_element_by_in(&scheduler, &items, |a, b| a.cmp(b)),
        Some(1_234)
    );
    assert_eq!(
        par::max_element_by_in(&scheduler, &items, |a, b| a.cmp(b)),
        Some(7_777)
    );
    scheduler.stop(true);
}

#[test]
fn min_element_of_singletons_and_empties() {
    let scheduler = pool(2);
    let empty: [u8; 0] = [];
    assert_eq!(par::min_element_by_in(&scheduler, &empty, |a, b| a.cmp(b)), None);
    assert_eq!(
        par::min_element_by_in(&scheduler, &[9_u8], |a, b| a.cmp(b)),
        Some(0)
    );
    scheduler.stop(true);
}

#[test]
fn find_if_returns_the_earliest_match() {
    let scheduler = pool(4);
    let items = [0_u32, 0, 100, 0, 100, 0];
    assert_eq!(
        par::find_if_in(&scheduler, &items, |x| *x == 100),
        Some(2)
    );
    scheduler.stop(true);
}

#[test]
fn find_if_earliest_wins_across_chunks() {
    let scheduler = pool(4);
    let mut items = vec![0_u32; 50_000];
    // Matches late in a low chunk and early in a high chunk; the lower
    // position must win regardless of which task finds its hit first.
    items[12_000] = 1;
    items[40_001] = 1;

    assert_eq!(par::find_if_in(&scheduler, &items, |x| *x == 1), Some(12_000));
    scheduler.stop(true);
}

#[test]
fn find_if_misses_cleanly() {
    let scheduler = pool(4);
    let items = vec![0_u32; 10_000];
    assert_eq!(par::find_if_in(&scheduler, &items, |x| *x == 1), None);
    assert_eq!(par::find_if_in(&scheduler, &[] as &[u32], |x| *x == 1), None);
    scheduler.stop(true);
}

#[test]
fn equal_detects_equality_and_any_single_difference() {
    let scheduler = pool(4);
    let lhs: Vec<u32> = (0..20_000).collect();

    assert!(par::equal_in(&scheduler, &lhs, &lhs.clone(), |a, b| a == b));

    let mut rhs = lhs.clone();
    rhs[19_999] = 0;
    assert!(!par::equal_in(&scheduler, &lhs, &rhs, |a, b| a == b));

    // Different lengths are unequal without any comparison.
    assert!(!par::equal_in(&scheduler, &lhs, &lhs[..1], |a, b| a == b));
    scheduler.stop(true);
}

#[test]
fn scan_computes_inclusive_prefix_sums() {
    let scheduler = pool(4);
    let input = [1_u64, 2, 3, 4, 5];
    let mut output = [0_u64; 5];

    par::scan_in(&scheduler, &input, &mut output, |a, b| a + b);
    assert_eq!(output, [1, 3, 6, 10, 15]);
    scheduler.stop(true);
}

#[test]
fn scan_matches_serial_on_large_input() {
    let scheduler = pool(4);
    let input: Vec<u64> = shuffled(30_000).into_iter().map(|x| x % 1_000).collect();
    let mut output = vec![0_u64; input.len()];

    par::scan_in(&scheduler, &input, &mut output, |a, b| a + b);

    let mut expected = Vec::with_capacity(input.len());
    let mut running = 0_u64;
    for item in &input {
        running += item;
        expected.push(running);
    }
    assert_eq!(output, expected);
    scheduler.stop(true);
}

#[test]
#[should_panic(expected = "scan output length")]
fn scan_rejects_mismatched_output() {
    let scheduler = pool(2);
    let mut output = [0_u64; 2];
    par::scan_in(&scheduler, &[1_u64, 2, 3], &mut output, |a, b| a + b);
}

#[test]
fn sort_example_from_the_manual() {
    let scheduler = pool(4);
    let mut items = [3_u32, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5];
    par::sort_in(&scheduler, &mut items);
    assert_eq!(items, [1, 1, 2, 3, 3, 4, 5, 5, 5, 6, 9]);
    scheduler.stop(true);
}

#[test]
fn sort_large_matches_std_and_is_idempotent() {
    let scheduler = pool(4);
    let mut items = shuffled(100_000);
    let mut expected = items.clone();
    expected.sort_unstable();

    let sorted = execute_or_abandon({
        let scheduler = scheduler.clone();
        move || {
            par::sort_in(&scheduler, &mut items);
            items
        }
    })
    .expect("parallel sort did not finish in time");
    assert_eq!(sorted, expected);

    // Sorting a sorted range changes nothing.
    let mut items = sorted;
    par::sort_in(&scheduler, &mut items);
    assert_eq!(items, expected);
    scheduler.stop(true);
}

#[test]
fn sort_by_honors_the_comparator() {
    let scheduler = pool(4);
    let mut items = shuffled(50_000);
    let mut expected = items.clone();
    expected.sort_unstable_by(|a, b| b.cmp(a));

    par::sort_by_in(&scheduler, &mut items, |a, b| b.cmp(a));
    assert_eq!(items, expected);
    scheduler.stop(true);
}

#[test]
fn stable_sort_preserves_the_order_of_equal_keys() {
    let scheduler = pool(4);
    // Key with an attached original position; compare by key only.
    let mut items: Vec<(u32, usize)> = shuffled(60_000)
        .into_iter()
        .enumerate()
        .map(|(position, value)| ((value % 16) as u32, position))
        .collect();

    par::stable_sort_by_in(&scheduler, &mut items, |a, b| a.0.cmp(&b.0));

    assert!(items.windows(2).all(|pair| {
        pair[0].0 < pair[1].0 || (pair[0].0 == pair[1].0 && pair[0].1 < pair[1].1)
    }));
    scheduler.stop(true);
}

#[test]
fn small_ranges_fall_through_to_the_serial_paths() {
    let scheduler = pool(4);

    let mut items = [5_u32, 2, 9, 1];
    par::sort_in(&scheduler, &mut items);
    assert_eq!(items, [1, 2, 5, 9]);

    let input = [4_u64, 4, 4];
    let mut output = [0_u64; 3];
    par::scan_in(&scheduler, &input, &mut output, |a, b| a + b);
    assert_eq!(output, [4, 8, 12]);

    assert_eq!(par::reduce_in(&scheduler, &[1_u8, 2], 0, |a, b| a + b), 3);
    scheduler.stop(true);
}

#[test]
fn bitonic_sort_matches_std() {
    let scheduler = pool(4);
    // Above the bitonic partition floor so the parallel path is exercised.
    let mut items = shuffled(1 << 17);
    let mut expected = items.clone();
    expected.sort_unstable();

    let sorted = execute_or_abandon({
        let scheduler = scheduler.clone();
        move || {
            par::bitonic_sort_in(&scheduler, &mut items);
            items
        }
    })
    .expect("bitonic sort did not finish in time");
    assert_eq!(sorted, expected);
    scheduler.stop(true);
}

#[test]
fn global_scheduler_wrappers_work_end_to_end() {
    let items: Vec<u64> = (0..4_000).collect();
    assert_eq!(par::reduce(&items, 0, |a, b| a + b), 4_000 * 3_999 / 2);
    assert_eq!(par::find_if(&items, |x| *x == 1_234), Some(1_234));

    let mut sortable = shuffled(10_000);
    let mut expected = sortable.clone();
    expected.sort_unstable();
    par::sort(&mut sortable);
    assert_eq!(sortable, expected);
}
