// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::process::ExitCode;

use treadle::{compose_future, get_task_scheduler, make_future_result};

fn main() -> ExitCode {
    let scheduler = get_task_scheduler();

    let future = make_future_result(&scheduler, || {
        println!("Hello from the pool!");
        21
    });
    let doubled = future.next(|value: i32| value * 2);

    let stream = compose_future!(|x: i32| x * 2, |x: i32| x * 3, |x: i32| x * 4);
    let piped = stream.apply(1);

    match (doubled.get(), piped.get()) {
        (Ok(42), Ok(24)) => ExitCode::SUCCESS,
        (doubled, piped) => {
            eprintln!("unexpected results: {doubled:?} / {piped:?}");
            ExitCode::FAILURE
        }
    }
}
