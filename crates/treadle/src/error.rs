// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;

use thiserror::Error;

/// A specialized `Result` type carried by task and future-result cells.
///
/// The `Err` variant is what the rest of this crate calls an *exception
/// state*: a user callable panicked, or a task could not be admitted to the
/// scheduler, and the failure is waiting in the cell for whoever consumes it.
pub type TaskResult<T> = std::result::Result<T, TaskError>;

/// An error produced while executing or scheduling a task.
///
/// Errors propagate through continuation chains untouched: a continuation
/// installed on a failed future result is never invoked and its successor
/// cell receives a clone of the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TaskError {
    /// A user-supplied callable panicked. The panic was caught at the task
    /// boundary and converted into this error; the worker thread survives.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// A task could not be admitted because the scheduler was stopped or is
    /// shutting down.
    #[error("unable to add task")]
    UnableToAddTask,
}

impl TaskError {
    /// Converts a payload caught by `std::panic::catch_unwind` into an error.
    ///
    /// Panic payloads are almost always `&str` or `String`; anything else is
    /// recorded with a generic message because the payload itself is opaque
    /// and usually not `Send + Sync + Clone`.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        if let Some(message) = payload.downcast_ref::<&str>() {
            Self::Panicked((*message).to_string())
        } else if let Some(message) = payload.downcast_ref::<String>() {
            Self::Panicked(message.clone())
        } else {
            Self::Panicked("non-string panic payload".to_string())
        }
    }
}
