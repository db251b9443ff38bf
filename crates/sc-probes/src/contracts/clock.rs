// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `CLOCK_MONOTONIC` resolution and ordering.

use std::fmt;

use nix::sys::time::TimeSpec;
use nix::time::{clock_getres, clock_gettime, ClockId};
use tracing::debug;

use super::{ContractFamily, Outcome};
use crate::context::ProbeContext;
use crate::error::{ProbeError, ProbeResult, SyscallExt};

const FAMILY: ContractFamily = ContractFamily::MonotonicClock;
const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A clock value as `(seconds, nanoseconds)`; ordering is lexicographic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reading {
    pub sec: i64,
    pub nsec: i64,
}

impl Reading {
    pub fn new(sec: i64, nsec: i64) -> Self {
        Self { sec, nsec }
    }

    fn is_normalized(&self) -> bool {
        self.sec >= 0 && (0..NANOS_PER_SEC).contains(&self.nsec)
    }

    /// Finer than one nanosecond cannot be told apart by a timespec.
    fn distinguishes_nanoseconds(&self) -> bool {
        *self <= Reading::new(0, 1)
    }
}

impl From<TimeSpec> for Reading {
    fn from(ts: TimeSpec) -> Self {
        Self::new(ts.tv_sec() as i64, ts.tv_nsec() as i64)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}s", self.sec, self.nsec)
    }
}

pub fn check_resolution(resolution: Reading) -> Result<(), String> {
    if !resolution.is_normalized() {
        return Err(format!("resolution {:?} is not a valid timespec", resolution));
    }
    Ok(())
}

/// The second reading must come strictly after the first. Equal readings
/// pass only when the clock is too coarse to tell them apart.
pub fn check_monotonic(first: Reading, second: Reading, resolution: Reading) -> Result<(), String> {
    for reading in [first, second] {
        if !reading.is_normalized() {
            return Err(format!("reading {:?} is not a valid timespec", reading));
        }
    }
    if second > first {
        return Ok(());
    }
    if second == first && !resolution.distinguishes_nanoseconds() {
        return Ok(());
    }
    Err(format!(
        "second reading {} does not follow first reading {} (resolution {})",
        second, first, resolution
    ))
}

fn resolution() -> ProbeResult<Reading> {
    let resolution = Reading::from(clock_getres(ClockId::CLOCK_MONOTONIC).syscall("clock_getres")?);
    check_resolution(resolution).map_err(|detail| ProbeError::violation(FAMILY, detail))?;
    Ok(resolution)
}

pub fn clock_getres_monotonic(_ctx: &ProbeContext) -> ProbeResult<Outcome> {
    let resolution = resolution()?;
    debug!(%resolution, "monotonic resolution");
    Ok(Outcome::new(format!("resolution {}", resolution)))
}

pub fn clock_gettime_monotonic(_ctx: &ProbeContext) -> ProbeResult<Outcome> {
    let resolution = resolution()?;
    let first = Reading::from(clock_gettime(ClockId::CLOCK_MONOTONIC).syscall("clock_gettime")?);
    let second = Reading::from(clock_gettime(ClockId::CLOCK_MONOTONIC).syscall("clock_gettime")?);
    debug!(%first, %second, %resolution, "monotonic readings");

    check_monotonic(first, second, resolution)
        .map_err(|detail| ProbeError::violation(FAMILY, detail))?;
    Ok(Outcome::new(format!("{} then {}", first, second)))
}
