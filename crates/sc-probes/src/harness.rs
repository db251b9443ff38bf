// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Entry point shared by the probe executables.
//!
//! A probe takes no arguments. It grants its fixture directories relative to
//! the working directory, runs once, and reports through its exit status:
//! 0 when every assertion held, 1 otherwise. Diagnostics go to stderr.

use std::path::Path;
use std::process::ExitCode;

use sc_logging::{Level, LogFormat};
use tracing::{error, info, info_span};

use crate::contracts::Outcome;
use crate::error::{ProbeError, ProbeResult};
use crate::registry::{self, Probe};

/// Run one probe against the fixture tree below `base`.
pub fn run(probe: &Probe, base: &Path) -> ProbeResult<Outcome> {
    let span = info_span!("probe", name = probe.name, family = %probe.family);
    let _enter = span.enter();

    let ctx = probe.context(base)?;
    (probe.run)(&ctx)
}

pub fn run_named(name: &str, base: &Path) -> ProbeResult<Outcome> {
    let probe = registry::find(name).ok_or_else(|| ProbeError::UnknownProbe(name.to_string()))?;
    run(probe, base)
}

/// `main` of a probe executable.
pub fn main(name: &str) -> ExitCode {
    if let Err(err) = sc_logging::init(name, Level::INFO, LogFormat::Plaintext) {
        eprintln!("{}: failed to initialize logging: {:#}", name, err);
    }

    let base = match std::env::current_dir() {
        Ok(base) => base,
        Err(err) => {
            error!(probe = name, error = %err, "cannot determine working directory");
            return ExitCode::FAILURE;
        }
    };

    match run_named(name, &base) {
        Ok(outcome) => {
            info!(probe = name, %outcome, "contract held");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(probe = name, violation = err.is_violation(), error = %err, "probe failed");
            ExitCode::FAILURE
        }
    }
}
