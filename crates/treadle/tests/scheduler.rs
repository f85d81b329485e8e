// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use static_assertions::assert_impl_all;
use treadle::{SharedLatch, TaskScheduler, get_task_scheduler, make_future_result};
use treadle_testing::execute_or_abandon;

// The scheduler is meant to be shared freely across threads.
assert_impl_all!(TaskScheduler: Send, Sync, Clone);
assert_impl_all!(SharedLatch: Send, Sync, Clone);

#[test]
fn the_default_scheduler_is_shared_and_running() {
    let first = get_task_scheduler();
    let second = get_task_scheduler();

    assert!(first.started());
    assert!(second.started());
    assert_eq!(first.size(), second.size());

    let latch = SharedLatch::new();
    assert!(first.add_task_with_latch(|| {}, latch.clone()));
    execute_or_abandon(move || latch.wait()).expect("default scheduler did not run the task");
}

#[test]
fn nested_waits_complete_under_saturation() {
    // Every task blocks on a future computed by another task, on a pool much
    // smaller than the task count. Completion proves the re-entrant wait
    // machinery keeps the pool making progress.
    let scheduler = TaskScheduler::builder().with_thread_count(2).build();
    let completed = Arc::new(AtomicUsize::new(0));
    let all_done = SharedLatch::with_count(16);

    for n in 0..16_u64 {
        let inner_scheduler = scheduler.clone();
        let completed = Arc::clone(&completed);
        assert!(scheduler.add_task_with_latch(
            move || {
                let future = make_future_result(&inner_scheduler, move || n * 2);
                assert_eq!(future.get(), Ok(n * 2));
                _ = completed.fetch_add(1, Ordering::AcqRel);
            },
            all_done.clone(),
        ));
    }

    execute_or_abandon({
        let all_done = all_done.clone();
        move || all_done.wait()
    })
    .expect("saturated nested waits deadlocked");
    assert_eq!(completed.load(Ordering::Acquire), 16);
    scheduler.stop(true);
}

#[test]
fn wait_for_from_outside_the_pool_blocks_until_done() {
    let scheduler = TaskScheduler::builder().with_thread_count(2).build();
    let latch = SharedLatch::with_count(3);

    for _ in 0..3 {
        assert!(scheduler.add_task_with_latch(|| {}, latch.clone()));
    }

    execute_or_abandon({
        let scheduler = scheduler.clone();
        let latch = latch.clone();
        move || scheduler.wait_for(&latch)
    })
    .expect("wait_for never returned");
    assert!(latch.try_wait());
    scheduler.stop(true);
}
