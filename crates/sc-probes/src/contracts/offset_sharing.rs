// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! One offset cursor shared by a stdio stream and its raw descriptor.

use sc_fixtures::{LSEEK_CONTENT, LSEEK_TXT};
use tracing::debug;

use super::{ContractFamily, Outcome};
use crate::context::ProbeContext;
use crate::ensure_contract;
use crate::error::{ProbeResult, SyscallExt};
use crate::sys::{FdExt, Stream, Whence};

const FAMILY: ContractFamily = ContractFamily::OffsetSharing;

/// Where the cursor must sit after consuming `consumed` bytes through any
/// mix of views, starting from `start`.
pub fn expected_cursor(start: u64, consumed: &[usize]) -> u64 {
    start + consumed.iter().map(|n| *n as u64).sum::<u64>()
}

fn check_cursor(stream: &Stream, expected: u64, after: &str) -> ProbeResult<()> {
    let cursor = stream.cursor().syscall("lseek")?;
    debug!(cursor, expected, after, "cursor observed");
    ensure_contract!(
        FAMILY,
        cursor == expected,
        "cursor at {} after {}, expected {}",
        cursor,
        after,
        expected
    );
    Ok(())
}

pub fn lseek(ctx: &ProbeContext) -> ProbeResult<Outcome> {
    let mut stream = ctx.fopen(LSEEK_TXT, "r")?;
    let mut consumed = Vec::new();

    let mut buf = [0u8; 4];
    let n = stream.read(&mut buf).syscall("fread")?;
    ensure_contract!(FAMILY, n == buf.len(), "fread returned {} of {} bytes", n, buf.len());
    stream.flush().syscall("fflush")?;
    consumed.push(n);
    check_cursor(&stream, expected_cursor(0, &consumed), "buffered read of 4")?;

    let mut one = [0u8; 1];
    let n = stream.read(&mut one).syscall("fread")?;
    ensure_contract!(FAMILY, n == 1, "fread returned {} bytes", n);
    stream.flush().syscall("fflush")?;
    consumed.push(n);
    let position = expected_cursor(0, &consumed);
    check_cursor(&stream, position, "buffered read of 1")?;

    let expected_byte = LSEEK_CONTENT[position as usize - 1];
    ensure_contract!(
        FAMILY,
        one[0] == expected_byte,
        "buffered read returned {:?}, expected {:?}",
        one[0] as char,
        expected_byte as char
    );

    // The raw view picks up exactly where the flushed stream stopped.
    let n = stream.read_raw(&mut one).syscall("read")?;
    ensure_contract!(FAMILY, n == 1, "raw read returned {} bytes", n);
    consumed.push(n);
    let expected_byte = LSEEK_CONTENT[position as usize];
    ensure_contract!(
        FAMILY,
        one[0] == expected_byte,
        "raw read returned {:?}, expected {:?}",
        one[0] as char,
        expected_byte as char
    );
    check_cursor(&stream, expected_cursor(0, &consumed), "raw read of 1")?;

    let start = stream.seek_to(0, Whence::Set).syscall("lseek")?;
    ensure_contract!(FAMILY, start == 0, "seek to start returned {}", start);
    let end = stream.end_offset().syscall("lseek")?;
    ensure_contract!(
        FAMILY,
        end == LSEEK_CONTENT.len() as u64,
        "seek to end returned {}, expected {}",
        end,
        LSEEK_CONTENT.len()
    );

    stream.close().syscall("fclose")?;
    Ok(Outcome::new(format!(
        "{} bytes consumed across both views, end at {}",
        consumed.iter().sum::<usize>(),
        end
    )))
}
