// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::process::ExitCode;

fn main() -> ExitCode {
    sc_probes::harness::main("clock_gettime-monotonic")
}
