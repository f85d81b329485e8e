// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Helpers for tests that exercise blocking and concurrent code paths. Any
//! test that could hang wraps its waiting in [`execute_or_abandon`] so a
//! regression fails the test run instead of wedging it.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// If something (whatever) does not happen in a test within this time, the
/// test will fail.
///
/// We are conservative here and allow much time - this is only to break out
/// of infinite loops, not for any situations that are actually expected.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Executes a thread-safe function on a background thread and abandons it if
/// it does not complete before the test timeout.
///
/// There are multiple ways for the called function to fail:
///
/// 1. It fails to finish in the allowed time span.
/// 2. It panics, so the result is never sent.
///
/// In both cases the channel gets closed and `recv_timeout` reports an
/// error, which this function surfaces as `None`.
#[must_use]
pub fn execute_or_abandon<F, R>(f: F) -> Option<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let (sender, receiver) = mpsc::channel();

    drop(thread::spawn(move || {
        let result = f();
        // The receiver may have given up already; nothing to do about it.
        _ = sender.send(result);
    }));

    receiver.recv_timeout(TEST_TIMEOUT).ok()
}
