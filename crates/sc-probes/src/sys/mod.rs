// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Safe wrappers over the raw calls the probes exercise.
//!
//! Nothing here retries or papers over a result: every wrapper reports
//! exactly what the underlying call returned.

mod dir;
mod fd;
mod stream;

pub use dir::{DirEntry, DirStream};
pub use fd::{
    close, fd_is_open, fstat, raw_shutdown, FdExt, FileIdentity, FileKind, Whence,
};
pub use stream::Stream;
