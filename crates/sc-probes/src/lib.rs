// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Syscall contract probes.
//!
//! Each probe checks one observable contract of the host's filesystem, clock
//! or socket layer: positioned I/O against the offset cursor and `O_APPEND`,
//! the cursor shared by a stdio stream and its descriptor, `fdopendir`
//! enumeration against `fstatat`, `(dev, ino)` uniqueness, monotonic clock
//! ordering, `shutdown(2)` errors, and access outside granted directories.
//!
//! Probes are listed in [`registry::PROBES`] and compiled into one
//! executable each; [`harness::main`] is their shared entry point.

pub mod capability;
pub mod context;
pub mod contracts;
pub mod error;
pub mod harness;
pub mod registry;
pub mod sys;

pub use context::ProbeContext;
pub use contracts::{ContractFamily, Outcome};
pub use error::{ErrorClass, ProbeError, ProbeResult};
pub use registry::{find, Probe, ProbeManifest, PROBES};
