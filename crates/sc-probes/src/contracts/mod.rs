// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Contract families and their probes.
//!
//! Every probe follows the same shape: establish a precondition, run the
//! syscall sequence, and compare what it observed against an expectation
//! derived independently. The comparison lives in small pure checkers so it
//! can be tested without touching the filesystem.

use std::fmt;

use serde::Serialize;

pub mod access;
pub mod clock;
pub mod directory;
pub mod identity;
pub mod offset_sharing;
pub mod positioned_io;
pub mod socket;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContractFamily {
    PositionedIo,
    OffsetSharing,
    DirectoryEnumeration,
    FileIdentity,
    MonotonicClock,
    SocketErrors,
    CapabilityAccess,
}

impl ContractFamily {
    pub const ALL: [ContractFamily; 7] = [
        ContractFamily::PositionedIo,
        ContractFamily::OffsetSharing,
        ContractFamily::DirectoryEnumeration,
        ContractFamily::FileIdentity,
        ContractFamily::MonotonicClock,
        ContractFamily::SocketErrors,
        ContractFamily::CapabilityAccess,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContractFamily::PositionedIo => "positioned-io",
            ContractFamily::OffsetSharing => "offset-sharing",
            ContractFamily::DirectoryEnumeration => "directory-enumeration",
            ContractFamily::FileIdentity => "file-identity",
            ContractFamily::MonotonicClock => "monotonic-clock",
            ContractFamily::SocketErrors => "socket-errors",
            ContractFamily::CapabilityAccess => "capability-access",
        }
    }
}

impl fmt::Display for ContractFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a passing probe observed, for the log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    pub summary: String,
}

impl Outcome {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_serialized_name() {
        for family in ContractFamily::ALL {
            let json = serde_json::to_string(&family).unwrap();
            assert_eq!(json, format!("\"{}\"", family));
        }
    }
}
