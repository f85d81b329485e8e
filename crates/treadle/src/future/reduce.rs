// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::FutureResult;

/// Pairwise tree reduction over a set of future results.
///
/// Each round chains element `2i` with a continuation that combines its
/// value with element `2i+1`'s (blocking on the right-hand side is legal:
/// the continuation runs inside a scheduler task, where waits are
/// re-entrant). An odd leftover is carried into the next round. The returned
/// future settles once the whole tree has been merged; an error anywhere
/// propagates to it.
///
/// # Panics
///
/// Panics if `futures` is empty.
pub fn reduce_futures<T, Op>(futures: Vec<FutureResult<T>>, op: Op) -> FutureResult<T>
where
    T: Send + 'static,
    Op: Fn(T, T) -> T + Clone + Send + Sync + 'static,
{
    assert!(
        !futures.is_empty(),
        "reduce_futures requires at least one future"
    );

    let mut round = futures;
    while round.len() > 1 {
        let mut next_round = Vec::with_capacity(round.len().div_ceil(2));
        let mut pending = round.into_iter();
        while let Some(left) = pending.next() {
            match pending.next() {
                Some(right) => {
                    let op = op.clone();
                    next_round
                        .push(left.next_result(move |lhs| Ok(op(lhs, right.get()?))));
                }
                None => next_round.push(left),
            }
        }
        round = next_round;
    }

    round.pop().expect("reduction always leaves one future")
}
