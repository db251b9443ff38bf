// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::borrow::Cow;
use std::ffi::{CStr, CString};
use std::io;
use std::os::fd::{AsFd, BorrowedFd, IntoRawFd, OwnedFd};
use std::ptr::NonNull;

use nix::errno::Errno;

/// One `(name, d_ino)` pair read from a directory stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntry {
    name: CString,
    pub ino: u64,
}

impl DirEntry {
    pub fn name(&self) -> &CStr {
        &self.name
    }

    pub fn name_lossy(&self) -> Cow<'_, str> {
        self.name.to_string_lossy()
    }

    /// Names starting with `.`, including `.` and `..` themselves.
    pub fn is_hidden(&self) -> bool {
        self.name.to_bytes().first() == Some(&b'.')
    }
}

/// An owned `DIR*` obtained from an already-open directory descriptor.
#[derive(Debug)]
pub struct DirStream {
    dir: NonNull<libc::DIR>,
}

impl DirStream {
    /// `fdopendir(fd)`. The stream takes ownership of the descriptor.
    pub fn from_fd(fd: OwnedFd) -> io::Result<Self> {
        let raw = fd.into_raw_fd();
        let dir = unsafe { libc::fdopendir(raw) };
        match NonNull::new(dir) {
            Some(dir) => Ok(Self { dir }),
            None => {
                let err = io::Error::last_os_error();
                unsafe { libc::close(raw) };
                Err(err)
            }
        }
    }

    /// Next entry, `Ok(None)` at end of stream.
    ///
    /// `readdir` signals both end and failure with NULL; only errno tells
    /// them apart, so it is cleared before the call.
    pub fn next_entry(&mut self) -> io::Result<Option<DirEntry>> {
        Errno::clear();
        let entry = unsafe { libc::readdir(self.dir.as_ptr()) };
        if entry.is_null() {
            return match Errno::last_raw() {
                0 => Ok(None),
                code => Err(io::Error::from_raw_os_error(code)),
            };
        }

        let entry = unsafe { &*entry };
        let name = unsafe { CStr::from_ptr(entry.d_name.as_ptr()) }.to_owned();
        Ok(Some(DirEntry {
            name,
            ino: entry.d_ino as u64,
        }))
    }

    /// `closedir`, reporting its result.
    pub fn close(self) -> io::Result<()> {
        let dir = self.dir;
        std::mem::forget(self);
        if unsafe { libc::closedir(dir.as_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl AsFd for DirStream {
    fn as_fd(&self) -> BorrowedFd<'_> {
        // dirfd() stays valid until closedir().
        unsafe { BorrowedFd::borrow_raw(libc::dirfd(self.dir.as_ptr())) }
    }
}

impl Drop for DirStream {
    fn drop(&mut self) {
        unsafe { libc::closedir(self.dir.as_ptr()) };
    }
}
