// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::thread;

use crate::TaskScheduler;

/// Collects scheduler configuration and builds a started [`TaskScheduler`].
///
/// Defaults: one worker per available processor, blocking shutdown.
#[derive(Debug, Clone)]
pub struct TaskSchedulerBuilder {
    thread_count: Option<usize>,
    block_on_shutdown: bool,
}

impl TaskSchedulerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            thread_count: None,
            block_on_shutdown: true,
        }
    }

    /// Sets the number of worker threads (and queues).
    #[must_use]
    pub fn with_thread_count(mut self, thread_count: usize) -> Self {
        self.thread_count = Some(thread_count);
        self
    }

    /// Sets whether shutdown waits for workers to exit. Non-blocking
    /// shutdown detaches the workers; they still stop at their next check.
    #[must_use]
    pub const fn with_block_on_shutdown(mut self, block_on_shutdown: bool) -> Self {
        self.block_on_shutdown = block_on_shutdown;
        self
    }

    /// Builds the scheduler and starts its workers.
    ///
    /// # Panics
    ///
    /// Panics if a thread count of zero was configured.
    #[must_use]
    pub fn build(self) -> TaskScheduler {
        let thread_count = self.thread_count.unwrap_or_else(default_thread_count);
        let scheduler = TaskScheduler::new(thread_count, self.block_on_shutdown);
        scheduler.start();
        scheduler
    }
}

impl Default for TaskSchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Hardware concurrency, with a floor of one for platforms that cannot
/// report it.
fn default_thread_count() -> usize {
    thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_starts_the_configured_pool() {
        let scheduler = TaskSchedulerBuilder::new()
            .with_thread_count(3)
            .with_block_on_shutdown(true)
            .build();
        assert!(scheduler.started());
        assert_eq!(scheduler.size(), 3);
        scheduler.stop(true);
    }

    #[test]
    fn default_thread_count_is_positive() {
        assert!(default_thread_count() >= 1);
    }
}
