// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `pread`/`pwrite` against the shared offset cursor and `O_APPEND`.

use std::fmt;
use std::os::fd::AsFd;

use sc_fixtures::{PREAD_NEEDLE, PREAD_NEEDLE_OFFSET, PREAD_TXT, PWRITE_BUFFERED_CLEANUP};
use sc_fixtures::{PWRITE_CLEANUP, PWRITE_PREAD_CLEANUP};
use tracing::debug;

use super::{ContractFamily, Outcome};
use crate::context::ProbeContext;
use crate::ensure_contract;
use crate::error::{ProbeError, ProbeResult, SyscallExt};
use crate::sys::{close, FdExt, Stream, Whence};

const FAMILY: ContractFamily = ContractFamily::PositionedIo;
const APPEND_FLAGS: libc::c_int = libc::O_CREAT | libc::O_TRUNC | libc::O_WRONLY | libc::O_APPEND;
const CREATE_MODE: libc::mode_t = 0o644;

const FIRST_APPEND: &[u8] = b"ab";
const SECOND_APPEND: &[u8] = b"cd";
const BUFFERED: &[u8] = b"abcd";
const POSITIONED: &[u8] = b"XYZ";

const FULL_CONTENT: &[u8] = b"very long text";
const PATCH_OFFSET: u64 = 3;
const PATCH: &[u8] = b"test";

/// Where a positioned write on an `O_APPEND` descriptor landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendPolicy {
    /// The explicit offset was used (POSIX).
    HonorsOffset,
    /// The write went to end of file regardless of the offset.
    RedirectsToEnd,
}

impl fmt::Display for AppendPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppendPolicy::HonorsOffset => f.write_str("honors offset"),
            AppendPolicy::RedirectsToEnd => f.write_str("redirects to end"),
        }
    }
}

/// Decide which append policy produced `end`, given `appended` bytes
/// already in the file and a positioned write of `len` bytes at `offset`.
pub fn classify_append_end(
    end: u64,
    appended: u64,
    offset: u64,
    len: u64,
) -> Result<AppendPolicy, String> {
    let honored = appended.max(offset + len);
    let redirected = appended + len;
    if end == honored {
        Ok(AppendPolicy::HonorsOffset)
    } else if end == redirected {
        Ok(AppendPolicy::RedirectsToEnd)
    } else {
        Err(format!(
            "end of file at {}, expected {} (offset honored) or {} (redirected to end)",
            end, honored, redirected
        ))
    }
}

/// `base` with `patch` written over it at `offset`, growing it if needed.
pub fn overlay(base: &[u8], offset: usize, patch: &[u8]) -> Vec<u8> {
    let mut out = base.to_vec();
    let end = offset + patch.len();
    if out.len() < end {
        out.resize(end, 0);
    }
    out[offset..end].copy_from_slice(patch);
    out
}

/// File content the given policy must leave behind.
pub fn expected_content(
    policy: AppendPolicy,
    appended: &[u8],
    offset: usize,
    positioned: &[u8],
) -> Vec<u8> {
    match policy {
        AppendPolicy::HonorsOffset => overlay(appended, offset, positioned),
        AppendPolicy::RedirectsToEnd => [appended, positioned].concat(),
    }
}

fn read_back(ctx: &ProbeContext, path: &str) -> ProbeResult<Vec<u8>> {
    let fd = ctx.open(path, libc::O_RDONLY, 0)?;
    let mut content = Vec::new();
    let mut chunk = [0u8; 64];
    loop {
        let n = fd.read_raw(&mut chunk).syscall("read")?;
        if n == 0 {
            break;
        }
        content.extend_from_slice(&chunk[..n]);
    }
    close(fd).syscall("close")?;
    Ok(content)
}

/// Positioned write after append-mode writes; the cursor must not move and
/// the end of file must match one of the two policies.
///
/// Both outcomes pass on purpose, for the raw and the buffered append alike.
/// POSIX has `pwrite` honor the offset while Linux sends it to the end of an
/// `O_APPEND` file, so the buffered case may end at the buffered length or at
/// the buffered plus positioned length.
fn positioned_after_append<F: AsFd>(fd: &F, appended: u64) -> ProbeResult<AppendPolicy> {
    let written = fd.write_all_at(POSITIONED, 0).syscall("pwrite")?;
    ensure_contract!(FAMILY, written == POSITIONED.len(), "pwrite wrote {} bytes", written);

    let cursor = fd.cursor().syscall("lseek")?;
    ensure_contract!(
        FAMILY,
        cursor == appended,
        "pwrite moved the cursor from {} to {}",
        appended,
        cursor
    );

    let end = fd.end_offset().syscall("lseek")?;
    let policy = classify_append_end(end, appended, 0, POSITIONED.len() as u64)
        .map_err(|detail| ProbeError::violation(FAMILY, detail))?;
    debug!(cursor, end, %policy, "positioned write observed");
    Ok(policy)
}

fn verify_content(ctx: &ProbeContext, path: &str, expected: &[u8]) -> ProbeResult<()> {
    let content = read_back(ctx, path)?;
    ensure_contract!(
        FAMILY,
        content == expected,
        "{} holds {:?}, expected {:?}",
        path,
        String::from_utf8_lossy(&content),
        String::from_utf8_lossy(expected)
    );
    Ok(())
}

pub fn pwrite_with_append(ctx: &ProbeContext) -> ProbeResult<Outcome> {
    let fd = ctx.open(PWRITE_CLEANUP, APPEND_FLAGS, CREATE_MODE)?;

    let n = fd.write_raw(FIRST_APPEND).syscall("write")?;
    ensure_contract!(FAMILY, n == FIRST_APPEND.len(), "first write returned {}", n);

    let rewound = fd.seek_to(0, Whence::Set).syscall("lseek")?;
    ensure_contract!(FAMILY, rewound == 0, "seek to start returned {}", rewound);

    let n = fd.write_raw(SECOND_APPEND).syscall("write")?;
    ensure_contract!(FAMILY, n == SECOND_APPEND.len(), "second write returned {}", n);

    let appended = (FIRST_APPEND.len() + SECOND_APPEND.len()) as u64;
    let cursor = fd.cursor().syscall("lseek")?;
    ensure_contract!(
        FAMILY,
        cursor == appended,
        "O_APPEND write after rewind left the cursor at {}, expected {}",
        cursor,
        appended
    );

    let policy = positioned_after_append(&fd, appended)?;
    close(fd).syscall("close")?;

    let appended_bytes = [FIRST_APPEND, SECOND_APPEND].concat();
    verify_content(
        ctx,
        PWRITE_CLEANUP,
        &expected_content(policy, &appended_bytes, 0, POSITIONED),
    )?;

    Ok(Outcome::new(format!("append policy: {}", policy)))
}

pub fn pwrite_with_append_buffered(ctx: &ProbeContext) -> ProbeResult<Outcome> {
    let fd = ctx.open(PWRITE_BUFFERED_CLEANUP, APPEND_FLAGS, CREATE_MODE)?;
    let mut stream = Stream::from_fd(fd, "a").syscall("fdopen")?;

    let n = stream.write(BUFFERED).syscall("fwrite")?;
    ensure_contract!(FAMILY, n == BUFFERED.len(), "fwrite returned {}", n);
    stream.flush().syscall("fflush")?;

    let appended = BUFFERED.len() as u64;
    let cursor = stream.cursor().syscall("lseek")?;
    ensure_contract!(
        FAMILY,
        cursor == appended,
        "flushed stream left the descriptor cursor at {}, expected {}",
        cursor,
        appended
    );

    let policy = positioned_after_append(&stream, appended)?;
    stream.close().syscall("fclose")?;

    verify_content(
        ctx,
        PWRITE_BUFFERED_CLEANUP,
        &expected_content(policy, BUFFERED, 0, POSITIONED),
    )?;

    Ok(Outcome::new(format!("append policy: {}", policy)))
}

pub fn pwrite_with_access(ctx: &ProbeContext) -> ProbeResult<Outcome> {
    let path = PWRITE_PREAD_CLEANUP;
    if ctx.exists(path)? {
        return Err(ProbeError::Precondition(format!(
            "{} already exists; reset the fixture tree",
            path
        )));
    }

    let fd = ctx.open(path, libc::O_WRONLY | libc::O_CREAT, CREATE_MODE)?;
    let n = fd.write_all_at(FULL_CONTENT, 0).syscall("pwrite")?;
    ensure_contract!(FAMILY, n == FULL_CONTENT.len(), "pwrite accumulated {} bytes", n);
    let n = fd.write_all_at(PATCH, PATCH_OFFSET).syscall("pwrite")?;
    ensure_contract!(FAMILY, n == PATCH.len(), "pwrite accumulated {} bytes", n);

    let cursor = fd.cursor().syscall("lseek")?;
    ensure_contract!(FAMILY, cursor == 0, "pwrite moved the cursor to {}", cursor);
    close(fd).syscall("close")?;

    let fd = ctx.open(path, libc::O_RDONLY, 0)?;
    let mut buf = [0u8; 16];
    let n = fd.read_at_least(&mut buf, FULL_CONTENT.len()).syscall("read")?;
    let expected = overlay(FULL_CONTENT, PATCH_OFFSET as usize, PATCH);
    ensure_contract!(
        FAMILY,
        buf[..n] == expected[..],
        "read back {:?}, expected {:?}",
        String::from_utf8_lossy(&buf[..n]),
        String::from_utf8_lossy(&expected)
    );
    close(fd).syscall("close")?;

    ctx.remove(path)?;
    ensure_contract!(FAMILY, !ctx.exists(path)?, "{} still exists after remove", path);

    Ok(Outcome::new(format!("{} bytes round-tripped through pwrite", n)))
}

pub fn pread_with_access(ctx: &ProbeContext) -> ProbeResult<Outcome> {
    let fd = ctx.open(PREAD_TXT, libc::O_RDONLY, 0)?;
    let before = fd.cursor().syscall("lseek")?;

    let mut buf = vec![0u8; PREAD_NEEDLE.len()];
    fd.read_exact_at(&mut buf, PREAD_NEEDLE_OFFSET).syscall("pread")?;
    ensure_contract!(
        FAMILY,
        buf == PREAD_NEEDLE,
        "pread at {} returned {:?}",
        PREAD_NEEDLE_OFFSET,
        String::from_utf8_lossy(&buf)
    );

    let after = fd.cursor().syscall("lseek")?;
    ensure_contract!(FAMILY, after == before, "pread moved the cursor from {} to {}", before, after);
    close(fd).syscall("close")?;

    Ok(Outcome::new(format!(
        "{:?} at offset {}",
        String::from_utf8_lossy(PREAD_NEEDLE),
        PREAD_NEEDLE_OFFSET
    )))
}
