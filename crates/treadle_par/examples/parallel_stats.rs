// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::process::ExitCode;

use treadle::get_task_scheduler;
use treadle_par::{find_if_in, reduce_in, scan_in, sort_in};

fn main() -> ExitCode {
    let scheduler = get_task_scheduler();
    println!("pool size: {}", scheduler.size());

    let mut values: Vec<u64> = (0..1_000_000).map(|n| (n * 2_654_435_761) % 1_000_003).collect();

    let total = reduce_in(&scheduler, &values, 0, |a, b| a + b);
    println!("total: {total}");

    let mut running = vec![0_u64; values.len()];
    scan_in(&scheduler, &values, &mut running, |a, b| a + b);
    if running.last() != Some(&total) {
        eprintln!("scan total diverges from reduce");
        return ExitCode::FAILURE;
    }

    sort_in(&scheduler, &mut values);
    if find_if_in(&scheduler, &values, |v| *v >= 1_000_003).is_some() {
        eprintln!("sorted data contains an out-of-range value");
        return ExitCode::FAILURE;
    }

    println!("median: {}", values[values.len() / 2]);
    ExitCode::SUCCESS
}
