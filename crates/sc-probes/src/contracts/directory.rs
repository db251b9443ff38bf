// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `fdopendir` enumeration cross-checked against `fstatat`.

use sc_fixtures::{FOPENDIR_DIR, FOPENDIR_PREFIXES};
use tracing::debug;

use super::{ContractFamily, Outcome};
use crate::context::ProbeContext;
use crate::error::{ProbeError, ProbeResult, SyscallExt};
use crate::sys::{DirStream, FdExt};

const FAMILY: ContractFamily = ContractFamily::DirectoryEnumeration;

/// Accumulates visible directory entries and checks them against a set of
/// expected name prefixes. Order of observation is irrelevant.
#[derive(Debug)]
pub struct EnumerationCheck<'a> {
    prefixes: &'a [&'a str],
    seen: Vec<Option<(String, u64)>>,
}

impl<'a> EnumerationCheck<'a> {
    pub fn new(prefixes: &'a [&'a str]) -> Self {
        Self {
            prefixes,
            seen: vec![None; prefixes.len()],
        }
    }

    /// Record one non-hidden entry with the inode the stream reported and
    /// the inode an independent stat returned for the same name.
    pub fn observe(&mut self, name: &str, d_ino: u64, st_ino: u64) -> Result<(), String> {
        let slot = self
            .prefixes
            .iter()
            .position(|prefix| name.starts_with(prefix))
            .ok_or_else(|| format!("unexpected entry {:?}", name))?;

        if let Some((first, _)) = &self.seen[slot] {
            return Err(format!(
                "entries {:?} and {:?} both match prefix {:?}",
                first, name, self.prefixes[slot]
            ));
        }
        if d_ino != st_ino {
            return Err(format!(
                "{:?}: d_ino {} differs from st_ino {}",
                name, d_ino, st_ino
            ));
        }

        self.seen[slot] = Some((name.to_string(), d_ino));
        Ok(())
    }

    /// Every prefix matched exactly once and all inodes are distinct.
    pub fn finish(self) -> Result<Vec<(String, u64)>, String> {
        let mut found = Vec::with_capacity(self.seen.len());
        for (prefix, seen) in self.prefixes.iter().zip(self.seen) {
            found.push(seen.ok_or_else(|| format!("no entry matching {:?}", prefix))?);
        }

        for (i, (name_a, ino_a)) in found.iter().enumerate() {
            if let Some((name_b, _)) = found[i + 1..].iter().find(|(_, ino_b)| ino_b == ino_a) {
                return Err(format!(
                    "{:?} and {:?} share inode {}",
                    name_a, name_b, ino_a
                ));
            }
        }
        Ok(found)
    }
}

pub fn fdopendir_with_access(ctx: &ProbeContext) -> ProbeResult<Outcome> {
    let fd = ctx.open_dir(FOPENDIR_DIR)?;
    let mut stream = DirStream::from_fd(fd).syscall("fdopendir")?;
    let mut check = EnumerationCheck::new(&FOPENDIR_PREFIXES);

    while let Some(entry) = stream.next_entry().syscall("readdir")? {
        if entry.is_hidden() {
            continue;
        }
        let stat = stream.stat_at(entry.name()).syscall("fstatat")?;
        debug!(name = %entry.name_lossy(), d_ino = entry.ino, st_ino = stat.ino, "entry");
        check
            .observe(&entry.name_lossy(), entry.ino, stat.ino)
            .map_err(|detail| ProbeError::violation(FAMILY, detail))?;
    }
    stream.close().syscall("closedir")?;

    let found = check
        .finish()
        .map_err(|detail| ProbeError::violation(FAMILY, detail))?;
    let names: Vec<_> = found.iter().map(|(name, _)| name.as_str()).collect();
    Ok(Outcome::new(format!("entries {}", names.join(", "))))
}
