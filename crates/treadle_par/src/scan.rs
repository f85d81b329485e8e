// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use treadle::{TaskScheduler, get_task_scheduler};

use crate::{MIN_CHUNK_SCAN, SlicePtr, run_chunked, run_chunked_from, split_range};

/// Inclusive prefix scan: `output[i] = op(... op(input[0], input[1]),
/// ..., input[i])` for an associative `op`.
///
/// # Panics
///
/// Panics if the output length does not match the input length.
pub fn scan<T, Op>(input: &[T], output: &mut [T], op: Op)
where
    T: Clone + Send + Sync,
    Op: Fn(&T, &T) -> T + Send + Sync,
{
    scan_in(&get_task_scheduler(), input, output, op);
}

/// [`scan`] on an explicit scheduler.
///
/// Runs in two chunked phases. Phase one folds every chunk: chunk zero
/// writes its running sums straight into the output, the others publish
/// their totals into a cumulative prior-sum slot per chunk (guarded by a
/// spin lock each, since publications arrive from racing tasks). Phase two
/// rewrites chunks one onward, seeding each with its accumulated prior. The
/// full wait between the phases makes every phase-one publication visible.
pub fn scan_in<T, Op>(scheduler: &TaskScheduler, input: &[T], output: &mut [T], op: Op)
where
    T: Clone + Send + Sync,
    Op: Fn(&T, &T) -> T + Send + Sync,
{
    assert_eq!(
        input.len(),
        output.len(),
        "scan output length must match the input"
    );
    if input.is_empty() {
        return;
    }

    let chunks = split_range(input.len(), scheduler.size(), MIN_CHUNK_SCAN);
    if chunks.len() <= 1 {
        serial_scan(input, output, &op);
        return;
    }

    // priors[n] accumulates the totals of every chunk before chunk n.
    let priors: Vec<spin::Mutex<Option<T>>> =
        (0..chunks.len()).map(|_| spin::Mutex::new(None)).collect();
    let publish_total = |position: usize, total: &T| {
        for prior in &priors[position + 1..] {
            let mut slot = prior.lock();
            *slot = Some(match slot.take() {
                Some(accumulated) => op(&accumulated, total),
                None => total.clone(),
            });
        }
    };

    let out = SlicePtr::new(output);

    // Phase one: fold every chunk; chunk zero is final already.
    run_chunked(scheduler, &chunks, |range, index| {
        let chunk = &input[range.clone()];
        if index == 0 {
            // SAFETY: phase-one tasks write pairwise disjoint chunks, and
            // the output outlives the wait inside run_chunked.
            let out_chunk = unsafe { out.chunk_mut(range) };
            serial_scan(chunk, out_chunk, &op);
            publish_total(0, &out_chunk[out_chunk.len() - 1]);
        } else {
            let mut total = chunk[0].clone();
            for item in &chunk[1..] {
                total = op(&total, item);
            }
            publish_total(index, &total);
        }
    });

    // Phase two: rewrite chunks one onward, seeded with their priors.
    run_chunked_from(scheduler, &chunks, 1, |range, index| {
        let prior = priors[index]
            .lock()
            .clone()
            .unwrap_or_else(|| panic!("phase one published a prior for every later chunk"));
        // SAFETY: phase-two tasks write pairwise disjoint chunks, and the
        // output outlives the wait inside run_chunked_from.
        let out_chunk = unsafe { out.chunk_mut(range.clone()) };
        let chunk = &input[range];

        let mut running = op(&prior, &chunk[0]);
        out_chunk[0] = running.clone();
        for (out, item) in out_chunk[1..].iter_mut().zip(&chunk[1..]) {
            running = op(&running, item);
            *out = running.clone();
        }
    });
}

fn serial_scan<T, Op>(input: &[T], output: &mut [T], op: &Op)
where
    T: Clone,
    Op: Fn(&T, &T) -> T,
{
    let mut running: Option<T> = None;
    for (out, item) in output.iter_mut().zip(input) {
        let next = match running.take() {
            Some(acc) => op(&acc, item),
            None => item.clone(),
        };
        *out = next.clone();
        running = Some(next);
    }
}
