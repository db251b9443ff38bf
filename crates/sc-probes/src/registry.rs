// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The table of probes.
//!
//! Each entry is independent: a name, the contract family it checks, the
//! fixture directories it must be granted, and the function that runs it.

use std::fmt;
use std::path::Path;

use sc_fixtures::ROOT;
use serde::{Deserialize, Serialize};

use crate::context::ProbeContext;
use crate::contracts::{
    access, clock, directory, identity, offset_sharing, positioned_io, socket, ContractFamily,
    Outcome,
};
use crate::error::ProbeResult;

pub type ProbeFn = fn(&ProbeContext) -> ProbeResult<Outcome>;

#[derive(Clone, Copy)]
pub struct Probe {
    pub name: &'static str,
    pub family: ContractFamily,
    /// Fixture directories granted before the probe runs.
    pub dirs: &'static [&'static str],
    pub run: ProbeFn,
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe")
            .field("name", &self.name)
            .field("family", &self.family)
            .field("dirs", &self.dirs)
            .finish_non_exhaustive()
    }
}

const FIXTURE: &[&str] = &[ROOT];
const NONE: &[&str] = &[];

pub static PROBES: &[Probe] = &[
    Probe {
        name: "pwrite-with-append",
        family: ContractFamily::PositionedIo,
        dirs: FIXTURE,
        run: positioned_io::pwrite_with_append,
    },
    Probe {
        name: "pwrite-with-append-buffered",
        family: ContractFamily::PositionedIo,
        dirs: FIXTURE,
        run: positioned_io::pwrite_with_append_buffered,
    },
    Probe {
        name: "pwrite-with-access",
        family: ContractFamily::PositionedIo,
        dirs: FIXTURE,
        run: positioned_io::pwrite_with_access,
    },
    Probe {
        name: "pread-with-access",
        family: ContractFamily::PositionedIo,
        dirs: FIXTURE,
        run: positioned_io::pread_with_access,
    },
    Probe {
        name: "lseek",
        family: ContractFamily::OffsetSharing,
        dirs: FIXTURE,
        run: offset_sharing::lseek,
    },
    Probe {
        name: "fdopendir-with-access",
        family: ContractFamily::DirectoryEnumeration,
        dirs: FIXTURE,
        run: directory::fdopendir_with_access,
    },
    Probe {
        name: "stat-dev-ino",
        family: ContractFamily::FileIdentity,
        dirs: FIXTURE,
        run: identity::stat_dev_ino,
    },
    Probe {
        name: "clock_getres-monotonic",
        family: ContractFamily::MonotonicClock,
        dirs: NONE,
        run: clock::clock_getres_monotonic,
    },
    Probe {
        name: "clock_gettime-monotonic",
        family: ContractFamily::MonotonicClock,
        dirs: NONE,
        run: clock::clock_gettime_monotonic,
    },
    Probe {
        name: "sock_shutdown-not_sock",
        family: ContractFamily::SocketErrors,
        dirs: NONE,
        run: socket::sock_shutdown_not_sock,
    },
    Probe {
        name: "sock_shutdown-invalid_fd",
        family: ContractFamily::SocketErrors,
        dirs: NONE,
        run: socket::sock_shutdown_invalid_fd,
    },
    Probe {
        name: "fopen-with-no-access",
        family: ContractFamily::CapabilityAccess,
        dirs: NONE,
        run: access::fopen_with_no_access,
    },
];

pub fn find(name: &str) -> Option<&'static Probe> {
    PROBES.iter().find(|probe| probe.name == name)
}

impl Probe {
    /// Grant this probe's directories relative to `base`.
    pub fn context(&self, base: &Path) -> ProbeResult<ProbeContext> {
        ProbeContext::granting(base, self.dirs)
    }

    pub fn manifest(&self) -> ProbeManifest {
        ProbeManifest {
            dirs: self.dirs.iter().map(|dir| dir.to_string()).collect(),
            exit_code: 0,
            stdout: None,
        }
    }
}

/// Sidecar describing how a runner must invoke a probe and what it expects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeManifest {
    #[serde(default)]
    pub dirs: Vec<String>,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
}
