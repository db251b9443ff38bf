// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error taxonomy of `shutdown(2)` on descriptors that are not sockets.

use std::io;
use std::os::fd::{AsFd, AsRawFd, RawFd};

use tracing::debug;

use super::{ContractFamily, Outcome};
use crate::context::ProbeContext;
use crate::error::{expect_failure, ErrorClass, ProbeError, ProbeResult, SyscallExt};
use crate::sys::{fd_is_open, fstat, raw_shutdown, FileKind};

const FAMILY: ContractFamily = ContractFamily::SocketErrors;

/// Descriptor number assumed to be unused by a freshly started probe.
pub const INVALID_FD: RawFd = 420;

fn shutdown_fails_with(fd: RawFd, accepted: ErrorClass) -> ProbeResult<Outcome> {
    let outcome = raw_shutdown(fd).map_err(|err| ErrorClass::of(&err));
    debug!(fd, ?outcome, "shutdown(SHUT_RD)");
    let class = expect_failure(outcome, &[accepted])
        .map_err(|detail| ProbeError::violation(FAMILY, format!("shutdown({}): {}", fd, detail)))?;
    Ok(Outcome::new(format!("shutdown({}) failed with {}", fd, class)))
}

pub fn sock_shutdown_not_sock(_ctx: &ProbeContext) -> ProbeResult<Outcome> {
    let stdout = io::stdout();
    let fd = stdout.as_fd();
    let kind = fstat(fd)
        .map_err(|err| ProbeError::Precondition(format!("stdout is not usable: {}", err)))?
        .kind;
    if kind == FileKind::Socket {
        return Err(ProbeError::Precondition("stdout is a socket".into()));
    }
    shutdown_fails_with(fd.as_raw_fd(), ErrorClass::NotSocket)
}

pub fn sock_shutdown_invalid_fd(_ctx: &ProbeContext) -> ProbeResult<Outcome> {
    if fd_is_open(INVALID_FD).syscall("fcntl")? {
        return Err(ProbeError::Precondition(format!(
            "descriptor {} is unexpectedly open",
            INVALID_FD
        )));
    }
    shutdown_fails_with(INVALID_FD, ErrorClass::BadDescriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::OwnedFd;

    #[test]
    fn regular_file_is_not_a_socket() {
        let file = tempfile::tempfile().unwrap();
        let fd = OwnedFd::from(file);
        let outcome = shutdown_fails_with(fd.as_raw_fd(), ErrorClass::NotSocket).unwrap();
        assert!(outcome.summary.contains("not a socket"));
    }

    #[test]
    fn wrong_class_is_a_violation() {
        let file = tempfile::tempfile().unwrap();
        let fd = OwnedFd::from(file);
        let err = shutdown_fails_with(fd.as_raw_fd(), ErrorClass::BadDescriptor).unwrap_err();
        assert!(err.is_violation());
        assert!(err.to_string().contains("expected bad descriptor"));
    }

    #[test]
    fn connected_socket_shutdown_succeeds_and_is_a_violation() {
        let (a, _b) = std::os::unix::net::UnixStream::pair().unwrap();
        let err = shutdown_fails_with(a.as_raw_fd(), ErrorClass::NotSocket).unwrap_err();
        assert!(err.to_string().contains("call succeeded"));
    }

    #[test]
    fn unopened_descriptor_is_bad() {
        if fd_is_open(INVALID_FD).unwrap() {
            return;
        }
        sock_shutdown_invalid_fd(&ProbeContext::default()).unwrap();
    }
}
