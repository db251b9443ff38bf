// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `(st_dev, st_ino)` uniqueness.

use sc_fixtures::{FILE, LSEEK_TXT};
use tracing::debug;

use super::{ContractFamily, Outcome};
use crate::context::ProbeContext;
use crate::error::{ProbeError, ProbeResult, SyscallExt};
use crate::sys::{close, FdExt, FileIdentity, FileKind};

const FAMILY: ContractFamily = ContractFamily::FileIdentity;

/// Two distinct regular files on the same filesystem: same device,
/// different inode.
pub fn check_distinct_files(a: &FileIdentity, b: &FileIdentity) -> Result<(), String> {
    if a.kind != FileKind::Regular || b.kind != FileKind::Regular {
        return Err(format!("expected two regular files, got {:?} and {:?}", a.kind, b.kind));
    }
    if a.dev != b.dev {
        return Err(format!("sibling files report devices {} and {}", a.dev, b.dev));
    }
    if a.same_object(b) {
        return Err(format!("distinct files share inode {} on device {}", a.ino, a.dev));
    }
    Ok(())
}

pub fn stat_dev_ino(ctx: &ProbeContext) -> ProbeResult<Outcome> {
    let a = ctx.open(FILE, libc::O_RDONLY, 0)?;
    let b = ctx.open(LSEEK_TXT, libc::O_RDONLY, 0)?;

    let a_id = a.stat().syscall("fstat")?;
    let b_id = b.stat().syscall("fstat")?;
    debug!(?a_id, ?b_id, "identities");

    check_distinct_files(&a_id, &b_id).map_err(|detail| ProbeError::violation(FAMILY, detail))?;

    close(a).syscall("close")?;
    close(b).syscall("close")?;
    Ok(Outcome::new(format!(
        "device {}, inodes {} and {}",
        a_id.dev, a_id.ino, b_id.ino
    )))
}
