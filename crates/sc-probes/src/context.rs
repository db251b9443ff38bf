// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::os::fd::OwnedFd;
use std::path::Path;

use tracing::debug;

use crate::capability::Preopens;
use crate::error::{ProbeError, ProbeResult};
use crate::sys::Stream;

/// Everything a probe may touch: the directories it was granted.
#[derive(Debug, Default)]
pub struct ProbeContext {
    preopens: Preopens,
}

impl ProbeContext {
    pub fn new(preopens: Preopens) -> Self {
        Self { preopens }
    }

    /// Grant each of `dirs` relative to `base`. A grant that cannot be
    /// opened means the fixture is not in place.
    pub fn granting(base: &Path, dirs: &[&str]) -> ProbeResult<Self> {
        let mut preopens = Preopens::none();
        for dir in dirs {
            preopens.grant(base, dir).map_err(|err| {
                ProbeError::Precondition(format!("cannot grant fixture directory: {}", err))
            })?;
        }
        debug!(base = %base.display(), ?dirs, "probe context ready");
        Ok(Self::new(preopens))
    }

    pub fn preopens(&self) -> &Preopens {
        &self.preopens
    }

    pub fn open(&self, path: &str, flags: libc::c_int, mode: libc::mode_t) -> ProbeResult<OwnedFd> {
        Ok(self.preopens.open(path, flags, mode)?)
    }

    pub fn open_dir(&self, path: &str) -> ProbeResult<OwnedFd> {
        Ok(self.preopens.open_dir(path)?)
    }

    pub fn fopen(&self, path: &str, mode: &str) -> ProbeResult<Stream> {
        Ok(self.preopens.fopen(path, mode)?)
    }

    pub fn exists(&self, path: &str) -> ProbeResult<bool> {
        Ok(self.preopens.exists(path)?)
    }

    pub fn remove(&self, path: &str) -> ProbeResult<()> {
        Ok(self.preopens.remove(path)?)
    }
}
