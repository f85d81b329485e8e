// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use static_assertions::assert_impl_all;
use treadle::{
    FutureResult, FutureResultGroup, FutureStatus, TaskError, TaskScheduler, join,
    make_future_result, reduce_futures,
};
use treadle_testing::execute_or_abandon;

// Producer and consumer sides of a future result live on different threads.
assert_impl_all!(FutureResult<i32>: Send, Sync, Clone);

fn pool(threads: usize) -> TaskScheduler {
    TaskScheduler::builder().with_thread_count(threads).build()
}

#[test]
fn value_set_before_wait_is_observed() {
    let scheduler = pool(2);
    let future = FutureResult::new(&scheduler);
    future.set_value(42);

    assert!(future.try_wait());
    assert!(!future.is_failed());
    assert_eq!(future.get(), Ok(42));
    scheduler.stop(true);
}

#[test]
fn value_set_from_a_task_releases_waiters() {
    let scheduler = pool(2);
    let future = make_future_result(&scheduler, || 6 * 7);

    let outcome = execute_or_abandon({
        let future = future.clone();
        move || future.get()
    })
    .expect("future never settled");
    assert_eq!(outcome, Ok(42));
    scheduler.stop(true);
}

#[test]
fn panic_in_the_body_becomes_the_error_state() {
    let scheduler = pool(2);
    let future = make_future_result(&scheduler, || -> u32 { panic!("boom") });

    assert!(execute_or_abandon({
        let future = future.clone();
        move || future.is_failed()
    })
    .expect("future never settled"));

    assert_eq!(future.get(), Err(TaskError::Panicked("boom".to_string())));
    scheduler.stop(true);
}

#[test]
fn continuation_receives_the_value() {
    let scheduler = pool(2);
    let future = make_future_result(&scheduler, || 10);
    let doubled = future.next(|value: i32| value * 2);

    let outcome = execute_or_abandon(move || doubled.get()).expect("chain never settled");
    assert_eq!(outcome, Ok(20));
    scheduler.stop(true);
}

#[test]
fn continuation_on_an_already_ready_future_forwards_immediately() {
    let scheduler = pool(2);
    let future = FutureResult::new(&scheduler);
    future.set_value(5);

    let successor = future.next(|value: i32| value + 1);
    let outcome = execute_or_abandon(move || successor.get()).expect("successor never settled");
    assert_eq!(outcome, Ok(6));
    scheduler.stop(true);
}

#[test]
fn error_skips_the_continuation_and_poisons_the_successor() {
    let scheduler = pool(2);
    let invoked = Arc::new(AtomicBool::new(false));

    let future: FutureResult<i32> = FutureResult::new(&scheduler);
    let successor = future.next({
        let invoked = Arc::clone(&invoked);
        move |value: i32| {
            invoked.store(true, Ordering::Release);
            value
        }
    });

    future.set_error(TaskError::Panicked("upstream failed".to_string()));

    let outcome = execute_or_abandon({
        let successor = successor.clone();
        move || successor.get()
    })
    .expect("successor never settled");
    assert_eq!(
        outcome,
        Err(TaskError::Panicked("upstream failed".to_string()))
    );
    assert!(!invoked.load(Ordering::Acquire));
    scheduler.stop(true);
}

#[test]
fn chains_propagate_through_multiple_stages() {
    let scheduler = pool(2);
    let tail = make_future_result(&scheduler, || 1)
        .next(|x: i32| x + 1)
        .next(|x: i32| x * 10)
        .next(|x: i32| x - 5);

    let outcome = execute_or_abandon(move || tail.get()).expect("chain never settled");
    assert_eq!(outcome, Ok(15));
    scheduler.stop(true);
}

#[test]
#[should_panic(expected = "continued")]
fn get_on_a_continued_future_is_a_contract_violation() {
    let scheduler = pool(2);
    let future = FutureResult::new(&scheduler);
    future.set_value(1);
    let _successor = future.next(|value: i32| value);

    // The value moved into the successor; reading here is a bug.
    _ = future.get();
}

#[test]
#[should_panic(expected = "once")]
fn installing_two_continuations_is_a_contract_violation() {
    let scheduler = pool(2);
    let future: FutureResult<i32> = FutureResult::new(&scheduler);
    let _first = future.next(|value: i32| value);
    let _second = future.next(|value: i32| value);
}

#[test]
fn timed_wait_reports_timeout_then_ready() {
    let scheduler = pool(2);
    let future: FutureResult<i32> = FutureResult::new(&scheduler);

    assert_eq!(
        future.wait_for(Duration::from_millis(20)),
        FutureStatus::TimedOut
    );

    future.set_value(9);
    assert_eq!(
        future.wait_for(Duration::from_millis(20)),
        FutureStatus::Ready
    );
    scheduler.stop(true);
}

#[test]
fn fork_fans_one_value_into_independent_successors() {
    let scheduler = pool(2);
    let future = make_future_result(&scheduler, || 12);

    let (halved, tripled) = future.fork((|x: i32| x / 2, |x: i32| x * 3));

    let outcome = execute_or_abandon(move || (halved.get(), tripled.get()))
        .expect("fork branches never settled");
    assert_eq!(outcome, (Ok(6), Ok(36)));
    scheduler.stop(true);
}

#[test]
fn fork_on_a_failed_future_poisons_every_branch() {
    let scheduler = pool(2);
    let future: FutureResult<i32> = FutureResult::new(&scheduler);
    let (left, right) = future.fork((|x: i32| x, |x: i32| x));

    future.set_error(TaskError::Panicked("dead upstream".to_string()));

    let outcome =
        execute_or_abandon(move || (left.get(), right.get())).expect("branches never settled");
    assert_eq!(
        outcome,
        (
            Err(TaskError::Panicked("dead upstream".to_string())),
            Err(TaskError::Panicked("dead upstream".to_string()))
        )
    );
    scheduler.stop(true);
}

#[test]
fn reduce_futures_merges_a_whole_range() {
    let scheduler = pool(4);
    let futures: Vec<_> = (0..8)
        .map(|_| make_future_result(&scheduler, || 1_u64))
        .collect();

    let total = reduce_futures(futures, |lhs, rhs| lhs + rhs);
    let outcome = execute_or_abandon(move || total.get()).expect("reduction never settled");
    assert_eq!(outcome, Ok(8));
    scheduler.stop(true);
}

#[test]
fn reduce_futures_handles_odd_counts() {
    let scheduler = pool(2);
    let futures: Vec<_> = (1..=5)
        .map(|n| make_future_result(&scheduler, move || n))
        .collect();

    let total = reduce_futures(futures, |lhs, rhs| lhs + rhs);
    let outcome = execute_or_abandon(move || total.get()).expect("reduction never settled");
    assert_eq!(outcome, Ok(15));
    scheduler.stop(true);
}

#[test]
fn join_applies_the_function_to_all_values() {
    let scheduler = pool(2);
    let lhs = make_future_result(&scheduler, || 3);
    let rhs = make_future_result(&scheduler, || 4);

    let joined = join((lhs, rhs), |a: i32, b: i32| a * b);
    let outcome = execute_or_abandon(move || joined.get()).expect("join never settled");
    assert_eq!(outcome, Ok(12));
    scheduler.stop(true);
}

#[test]
fn group_isolates_branch_failures() {
    let scheduler = pool(2);
    let counter = Arc::new(AtomicUsize::new(0));

    let group = (
        {
            let counter = Arc::clone(&counter);
            move |base: usize| counter.fetch_add(base, Ordering::AcqRel)
        },
        |_base: usize| -> usize { panic!("branch two dies") },
        |base: usize| base * 100,
    )
        .submit(&scheduler, 5_usize);

    let (first, second, third) =
        execute_or_abandon(move || group.get().expect("the group future itself succeeds"))
            .expect("group never settled");

    assert_eq!(first, Ok(0));
    assert_eq!(second, Err(TaskError::Panicked("branch two dies".to_string())));
    assert_eq!(third, Ok(500));
    assert_eq!(counter.load(Ordering::Acquire), 5);
    scheduler.stop(true);
}

#[test]
fn submission_against_a_stopped_scheduler_pre_poisons_the_future() {
    let scheduler = TaskScheduler::new(1, true);
    // Never started.
    let future = make_future_result(&scheduler, || 1);
    assert!(future.try_wait());
    assert_eq!(future.get(), Err(TaskError::UnableToAddTask));
}

#[test]
fn weak_handles_rebind_while_the_future_lives() {
    let scheduler = pool(2);
    let future = make_future_result(&scheduler, || 11);
    let handle = future.get_handle();

    assert!(!handle.expired());
    let rebound = handle.lock().expect("future is alive");
    let outcome = execute_or_abandon(move || rebound.get()).expect("future never settled");
    assert_eq!(outcome, Ok(11));

    drop(future);
    assert!(handle.expired());
    assert!(handle.lock().is_none());
    scheduler.stop(true);
}
