// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error taxonomy shared by every probe.

use std::fmt;
use std::io;

use nix::errno::Errno;

use crate::capability::AccessError;
use crate::contracts::ContractFamily;

/// Classification of a failed call, restricted to the errno values the
/// contracts distinguish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    NotSocket,
    BadDescriptor,
    NoEntry,
    /// Refused by the capability layer: the path exists but no granted
    /// directory allows reaching it.
    NotCapable,
    Other(Errno),
}

impl ErrorClass {
    pub fn of_errno(errno: Errno) -> Self {
        match errno {
            Errno::ENOTSOCK => Self::NotSocket,
            Errno::EBADF => Self::BadDescriptor,
            Errno::ENOENT => Self::NoEntry,
            other => Self::Other(other),
        }
    }

    pub fn of(err: &io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) => Self::of_errno(Errno::from_raw(code)),
            None => Self::Other(Errno::UnknownErrno),
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::NotSocket => write!(f, "not a socket"),
            ErrorClass::BadDescriptor => write!(f, "bad descriptor"),
            ErrorClass::NoEntry => write!(f, "no such entry"),
            ErrorClass::NotCapable => write!(f, "not permitted under capability model"),
            ErrorClass::Other(errno) => write!(f, "{}", errno),
        }
    }
}

/// Why a probe did not pass
#[derive(thiserror::Error, Debug)]
pub enum ProbeError {
    #[error("{op} failed: {source}")]
    Syscall {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("precondition not met: {0}")]
    Precondition(String),

    #[error("{family} contract violated: {detail}")]
    Violation {
        family: ContractFamily,
        detail: String,
    },

    #[error("unknown probe: {0}")]
    UnknownProbe(String),
}

impl ProbeError {
    pub fn violation(family: ContractFamily, detail: impl Into<String>) -> Self {
        Self::Violation {
            family,
            detail: detail.into(),
        }
    }

    pub fn is_violation(&self) -> bool {
        matches!(self, Self::Violation { .. })
    }
}

pub type ProbeResult<T> = Result<T, ProbeError>;

/// Attach the failing call's name to an OS error.
pub trait SyscallExt<T> {
    fn syscall(self, op: &'static str) -> ProbeResult<T>;
}

impl<T, E: Into<io::Error>> SyscallExt<T> for Result<T, E> {
    fn syscall(self, op: &'static str) -> ProbeResult<T> {
        self.map_err(|err| ProbeError::Syscall {
            op,
            source: err.into(),
        })
    }
}

/// Return a [`ProbeError::Violation`] from the enclosing function unless the
/// condition holds.
#[macro_export]
macro_rules! ensure_contract {
    ($family:expr, $cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::ProbeError::violation($family, format!($($arg)+)));
        }
    };
}

/// Check that a call failed, and failed with one of the accepted classes.
pub fn expect_failure<T>(
    outcome: Result<T, ErrorClass>,
    accepted: &[ErrorClass],
) -> Result<ErrorClass, String> {
    let expected = accepted.iter().map(ToString::to_string).collect::<Vec<_>>().join(" or ");
    match outcome {
        Ok(_) => Err(format!("call succeeded, expected failure with {}", expected)),
        Err(class) if accepted.contains(&class) => Ok(class),
        Err(class) => Err(format!("call failed with {}, expected {}", class, expected)),
    }
}
