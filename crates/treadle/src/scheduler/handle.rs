// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Weak;

use crate::TaskScheduler;
use crate::scheduler::task_scheduler::SchedulerOwner;

/// A weak reference to a scheduler, for code that wants to re-enter the pool
/// without keeping it alive.
///
/// Long-lived task graphs capture handles instead of schedulers so that
/// dropping the last real [`TaskScheduler`] still shuts the pool down;
/// anything that later tries to [`lock`](Self::lock) simply observes that
/// the scheduler is gone.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    owner: Weak<SchedulerOwner>,
}

impl SchedulerHandle {
    pub(crate) fn new(owner: Weak<SchedulerOwner>) -> Self {
        Self { owner }
    }

    /// Whether the scheduler behind this handle has been destroyed.
    #[must_use]
    pub fn expired(&self) -> bool {
        self.owner.strong_count() == 0
    }

    /// Re-binds to the scheduler, or `None` if it has been destroyed.
    #[must_use]
    pub fn lock(&self) -> Option<TaskScheduler> {
        self.owner.upgrade().map(TaskScheduler::from_owner)
    }
}
