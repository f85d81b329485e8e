// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod builder;
mod handle;
mod scheduler_core;
mod task_group;
mod task_scheduler;
mod temp_runner;

use std::sync::OnceLock;

pub use builder::*;
pub use handle::*;
pub use task_group::*;
pub use task_scheduler::*;

pub(crate) use scheduler_core::SchedulerCore;
pub(crate) use temp_runner::TempTaskRunner;

static GLOBAL_SCHEDULER: OnceLock<TaskScheduler> = OnceLock::new();

/// Returns the process-wide default scheduler, creating and starting it on
/// first use.
///
/// The default pool has one worker per available processor and blocks on
/// shutdown. The instance lives for the rest of the process; if some caller
/// stopped it, the next call here restarts it.
#[must_use]
pub fn get_task_scheduler() -> TaskScheduler {
    let scheduler = GLOBAL_SCHEDULER.get_or_init(|| TaskSchedulerBuilder::new().build());
    if !scheduler.started() {
        scheduler.start();
    }
    scheduler.clone()
}
