// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The single poll -> yield -> sleep ladder used by every blocking helper in
//! the crate (queue pop, queue push, timed latch waits). The thresholds here
//! are the one source of truth for fairness between spinning callers.

use std::hint;
use std::thread;
use std::time::{Duration, Instant};

/// How long a caller busy-polls before it starts yielding the processor.
const SPIN_LIMIT: Duration = Duration::from_micros(4);

/// How long a caller yields before it starts sleeping between attempts.
const YIELD_LIMIT: Duration = Duration::from_micros(64);

/// Upper bound for a single sleep; keeps wakeup latency bounded once a
/// caller has been waiting for a long time.
const MAX_SLEEP: Duration = Duration::from_millis(8);

/// Tracks how long the caller has been retrying and backs off accordingly:
/// busy-poll for the first microseconds, yield the thread for a while after
/// that, then sleep for half the elapsed time (capped) per attempt.
#[derive(Debug)]
pub(crate) struct Backoff {
    started_at: Instant,
}

impl Backoff {
    pub(crate) fn new() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    /// Waits an amount appropriate to how long this `Backoff` has been live.
    /// Called once per failed attempt.
    pub(crate) fn snooze(&self) {
        let elapsed = self.started_at.elapsed();
        if elapsed < SPIN_LIMIT {
            hint::spin_loop();
        } else if elapsed < YIELD_LIMIT {
            thread::yield_now();
        } else {
            thread::sleep((elapsed / 2).min(MAX_SLEEP));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snooze_never_sleeps_longer_than_the_cap() {
        let backoff = Backoff {
            // Pretend the caller has been waiting for a long time already.
            started_at: Instant::now() - Duration::from_secs(60),
        };

        let before = Instant::now();
        backoff.snooze();
        let slept = before.elapsed();

        // Generous upper bound: the cap plus scheduling noise.
        assert!(slept < MAX_SLEEP + Duration::from_millis(100));
    }

    #[test]
    fn fresh_backoff_returns_quickly() {
        let backoff = Backoff::new();
        let before = Instant::now();
        backoff.snooze();
        assert!(before.elapsed() < Duration::from_millis(100));
    }
}
