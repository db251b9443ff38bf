// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Fixture tree shared by the syscall conformance probes.
//!
//! The probes only ever see the paths and contents declared here. Whoever
//! runs them must lay the tree out next to the probe's working directory
//! before each run; [`FixtureTree`] does exactly that for the test suite.

mod provider;

pub use provider::{FixtureError, FixtureTree};

/// Root directory of the fixture tree, relative to the probe's working directory.
pub const ROOT: &str = "fs-tests.dir";

/// Plain file used by the identity and no-access probes.
pub const FILE: &str = "fs-tests.dir/file";
/// File with fixed content used by the offset probes.
pub const LSEEK_TXT: &str = "fs-tests.dir/lseek.txt";
/// File holding `"d-t"` at byte offset 4.
pub const PREAD_TXT: &str = "fs-tests.dir/pread.txt";
/// Directory holding exactly the [`FOPENDIR_ENTRIES`].
pub const FOPENDIR_DIR: &str = "fs-tests.dir/fopendir.dir";
/// Scratch directory for probes that create files.
pub const WRITEABLE_DIR: &str = "fs-tests.dir/writeable";

/// Scratch file for the raw positioned-write probe.
pub const PWRITE_CLEANUP: &str = "fs-tests.dir/pwrite.cleanup";
/// Scratch file for the buffered positioned-write probe.
pub const PWRITE_BUFFERED_CLEANUP: &str = "fs-tests.dir/pwrite-buffered.cleanup";
/// Scratch file that must not exist before the pwrite-with-access probe runs.
pub const PWRITE_PREAD_CLEANUP: &str = "fs-tests.dir/writeable/test_pwrite_pread.txt.cleanup";

/// Suffix marking artifacts the provider removes between runs.
pub const CLEANUP_SUFFIX: &str = ".cleanup";

pub const FILE_CONTENT: &[u8] = b"file\n";
pub const LSEEK_CONTENT: &[u8] = b"01234567";
pub const PREAD_CONTENT: &[u8] = b"pread-test";

/// Offset of [`PREAD_NEEDLE`] inside [`PREAD_CONTENT`].
pub const PREAD_NEEDLE_OFFSET: u64 = 4;
pub const PREAD_NEEDLE: &[u8] = b"d-t";

/// Entries of [`FOPENDIR_DIR`]; probes match them by [`FOPENDIR_PREFIXES`].
pub const FOPENDIR_ENTRIES: [&str; 2] = ["file-0.txt", "file-1.txt"];
pub const FOPENDIR_PREFIXES: [&str; 2] = ["file-0", "file-1"];

/// Whether a file name carries the cleanup marker.
pub fn is_cleanup_artifact(name: &str) -> bool {
    name.len() > CLEANUP_SUFFIX.len() && name.ends_with(CLEANUP_SUFFIX)
}
