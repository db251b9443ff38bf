// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::ffi::CString;
use std::io;
use std::os::fd::{AsFd, BorrowedFd, IntoRawFd, OwnedFd, RawFd};
use std::ptr::NonNull;

use nix::errno::Errno;

/// An owned C stdio stream layered over a descriptor.
///
/// The stream and the descriptor share one kernel offset cursor, but the
/// stream keeps its own buffer on top of it. Callers flush before touching
/// the descriptor directly.
#[derive(Debug)]
pub struct Stream {
    file: NonNull<libc::FILE>,
}

impl Stream {
    /// `fdopen(fd, mode)`. The stream takes ownership of the descriptor.
    pub fn from_fd(fd: OwnedFd, mode: &str) -> io::Result<Self> {
        let mode = CString::new(mode)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "stream mode contains NUL"))?;
        let raw = fd.into_raw_fd();
        let file = unsafe { libc::fdopen(raw, mode.as_ptr()) };
        match NonNull::new(file) {
            Some(file) => Ok(Self { file }),
            None => {
                let err = io::Error::last_os_error();
                unsafe { libc::close(raw) };
                Err(err)
            }
        }
    }

    /// Buffered read (`fread`). A short count without a stream error means
    /// end of file.
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe {
            libc::fread(
                buf.as_mut_ptr() as *mut libc::c_void,
                1,
                buf.len(),
                self.file.as_ptr(),
            )
        };
        if n < buf.len() && unsafe { libc::ferror(self.file.as_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(n)
    }

    /// Buffered write (`fwrite`); bytes may stay in the stream until [`Stream::flush`].
    ///
    /// A short count is an error either way: the stream's own error when
    /// `ferror` is set, `WriteZero` otherwise.
    pub fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Errno::clear();
        let n = unsafe {
            libc::fwrite(
                buf.as_ptr() as *const libc::c_void,
                1,
                buf.len(),
                self.file.as_ptr(),
            )
        };
        if n < buf.len() {
            if unsafe { libc::ferror(self.file.as_ptr()) } != 0 {
                return Err(io::Error::last_os_error());
            }
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("fwrite accepted {} of {} bytes", n, buf.len()),
            ));
        }
        Ok(n)
    }

    /// `fflush`. On an input stream this hands unread buffered bytes back to
    /// the descriptor by moving its cursor to the stream's logical position.
    pub fn flush(&mut self) -> io::Result<()> {
        if unsafe { libc::fflush(self.file.as_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub fn fileno(&self) -> RawFd {
        unsafe { libc::fileno(self.file.as_ptr()) }
    }

    /// `fclose`, reporting its result.
    pub fn close(self) -> io::Result<()> {
        let file = self.file;
        std::mem::forget(self);
        if unsafe { libc::fclose(file.as_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl AsFd for Stream {
    fn as_fd(&self) -> BorrowedFd<'_> {
        // The descriptor stays open for as long as the stream does.
        unsafe { BorrowedFd::borrow_raw(self.fileno()) }
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        unsafe { libc::fclose(self.file.as_ptr()) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys::FdExt;
    use std::fs::File;

    fn open(path: &std::path::Path, mode: &str) -> Stream {
        let file = match mode {
            "r" => File::open(path).unwrap(),
            _ => std::fs::OpenOptions::new().append(true).create(true).open(path).unwrap(),
        };
        Stream::from_fd(OwnedFd::from(file), mode).unwrap()
    }

    #[test]
    fn flush_syncs_read_position_to_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("digits");
        std::fs::write(&path, b"0123456789").unwrap();

        let mut stream = open(&path, "r");
        let mut buf = [0u8; 3];
        assert_eq!(stream.read(&mut buf).unwrap(), 3);
        stream.flush().unwrap();
        assert_eq!(stream.cursor().unwrap(), 3);
        stream.close().unwrap();
    }

    #[test]
    fn buffered_write_reaches_file_after_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out");

        let mut stream = open(&path, "a");
        assert_eq!(stream.write(b"abc").unwrap(), 3);
        stream.flush().unwrap();
        assert_eq!(stream.end_offset().unwrap(), 3);
        drop(stream);

        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
    }

    #[test]
    fn read_past_end_is_short_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short");
        std::fs::write(&path, b"ab").unwrap();

        let mut stream = open(&path, "r");
        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
    }

    #[test]
    fn rejects_mode_with_nul() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, b"").unwrap();
        let fd = OwnedFd::from(File::open(&path).unwrap());
        let err = Stream::from_fd(fd, "r\0").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn write_on_read_only_stream_reports_the_stream_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ro");
        std::fs::write(&path, b"abc").unwrap();

        let mut stream = open(&path, "r");
        let err = stream.write(b"xyz").unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
        assert_ne!(err.kind(), io::ErrorKind::WriteZero);
        drop(stream);

        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
    }
}
