// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::ffi::CStr;
use std::io;
use std::mem::MaybeUninit;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, OwnedFd, RawFd};

/// Reference point for [`FdExt::seek_to`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Whence {
    Set,
    Current,
    End,
}

impl Whence {
    fn raw(self) -> libc::c_int {
        match self {
            Whence::Set => libc::SEEK_SET,
            Whence::Current => libc::SEEK_CUR,
            Whence::End => libc::SEEK_END,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    Socket,
    Fifo,
    CharDevice,
    BlockDevice,
    Unknown,
}

/// The `(device, inode)` pair of a filesystem object, with the bits of the
/// stat result the probes look at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileIdentity {
    pub dev: u64,
    pub ino: u64,
    pub kind: FileKind,
    pub size: u64,
}

impl FileIdentity {
    fn from_stat(st: &libc::stat) -> Self {
        let kind = match st.st_mode & libc::S_IFMT {
            libc::S_IFREG => FileKind::Regular,
            libc::S_IFDIR => FileKind::Directory,
            libc::S_IFLNK => FileKind::Symlink,
            libc::S_IFSOCK => FileKind::Socket,
            libc::S_IFIFO => FileKind::Fifo,
            libc::S_IFCHR => FileKind::CharDevice,
            libc::S_IFBLK => FileKind::BlockDevice,
            _ => FileKind::Unknown,
        };
        Self {
            dev: st.st_dev as u64,
            ino: st.st_ino as u64,
            kind,
            size: st.st_size as u64,
        }
    }

    /// Same device, same inode.
    pub fn same_object(&self, other: &FileIdentity) -> bool {
        self.dev == other.dev && self.ino == other.ino
    }
}

fn cvt_size(ret: libc::ssize_t) -> io::Result<usize> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret as usize)
    }
}

fn cvt_unit(ret: libc::c_int) -> io::Result<()> {
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// `fstat(2)` on a borrowed descriptor
pub fn fstat(fd: BorrowedFd<'_>) -> io::Result<FileIdentity> {
    let mut st = MaybeUninit::<libc::stat>::uninit();
    cvt_unit(unsafe { libc::fstat(fd.as_raw_fd(), st.as_mut_ptr()) })?;
    Ok(FileIdentity::from_stat(unsafe { &st.assume_init() }))
}

/// Close a descriptor and report the result of `close(2)`, which dropping
/// an [`OwnedFd`] silently discards.
pub fn close(fd: OwnedFd) -> io::Result<()> {
    let raw = fd.into_raw_fd();
    cvt_unit(unsafe { libc::close(raw) })
}

/// Whether a descriptor number currently refers to an open description.
pub fn fd_is_open(fd: RawFd) -> io::Result<bool> {
    if unsafe { libc::fcntl(fd, libc::F_GETFD) } != -1 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EBADF) {
        Ok(false)
    } else {
        Err(err)
    }
}

/// `shutdown(fd, SHUT_RD)` on a raw descriptor number, which need not be open.
pub fn raw_shutdown(fd: RawFd) -> io::Result<()> {
    cvt_unit(unsafe { libc::shutdown(fd, libc::SHUT_RD) })
}

/// Repeats `step` until `len` bytes have moved. `step` is handed the count so
/// far and returns how many more it moved; a zero return fails with `stalled`.
fn accumulate(
    len: usize,
    stalled: io::ErrorKind,
    what: &str,
    mut step: impl FnMut(usize) -> io::Result<usize>,
) -> io::Result<usize> {
    let mut done = 0;
    while done < len {
        let n = step(done)?;
        if n == 0 {
            return Err(io::Error::new(
                stalled,
                format!("{} stopped after {} of {} bytes", what, done, len),
            ));
        }
        done += n;
    }
    Ok(done)
}

/// Raw descriptor operations available on anything holding a descriptor.
///
/// All of these act on the kernel's offset cursor (or deliberately leave it
/// alone, for the positioned variants); none of them consult a userspace
/// buffer.
pub trait FdExt: AsFd {
    fn seek_to(&self, offset: i64, whence: Whence) -> io::Result<u64> {
        let ret = unsafe {
            libc::lseek(
                self.as_fd().as_raw_fd(),
                offset as libc::off_t,
                whence.raw(),
            )
        };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(ret as u64)
        }
    }

    /// Current cursor position (`lseek(fd, 0, SEEK_CUR)`).
    fn cursor(&self) -> io::Result<u64> {
        self.seek_to(0, Whence::Current)
    }

    /// Move the cursor to end of file and return it.
    fn end_offset(&self) -> io::Result<u64> {
        self.seek_to(0, Whence::End)
    }

    fn write_raw(&self, buf: &[u8]) -> io::Result<usize> {
        cvt_size(unsafe {
            libc::write(
                self.as_fd().as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
            )
        })
    }

    fn read_raw(&self, buf: &mut [u8]) -> io::Result<usize> {
        cvt_size(unsafe {
            libc::read(
                self.as_fd().as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        })
    }

    fn pwrite(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        cvt_size(unsafe {
            libc::pwrite(
                self.as_fd().as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                offset as libc::off_t,
            )
        })
    }

    fn pread(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        cvt_size(unsafe {
            libc::pread(
                self.as_fd().as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                offset as libc::off_t,
            )
        })
    }

    /// Positioned write of the whole buffer, looping over short writes.
    ///
    /// Each partial call continues at `offset + written`. Returns the
    /// accumulated count, which equals `buf.len()` on success.
    fn write_all_at(&self, buf: &[u8], offset: u64) -> io::Result<usize> {
        accumulate(buf.len(), io::ErrorKind::WriteZero, "pwrite", |done| {
            self.pwrite(&buf[done..], offset + done as u64)
        })
    }

    /// Positioned read filling the whole buffer, looping over short reads.
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        accumulate(buf.len(), io::ErrorKind::UnexpectedEof, "pread", |done| {
            self.pread(&mut buf[done..], offset + done as u64)
        })
    }

    /// Cursor-advancing reads into `buf` until at least `min` bytes arrived.
    fn read_at_least(&self, buf: &mut [u8], min: usize) -> io::Result<usize> {
        accumulate(min, io::ErrorKind::UnexpectedEof, "read", |done| {
            self.read_raw(&mut buf[done..])
        })
    }

    fn stat(&self) -> io::Result<FileIdentity> {
        fstat(self.as_fd())
    }

    /// `fstatat(fd, name, AT_SYMLINK_NOFOLLOW)`
    fn stat_at(&self, name: &CStr) -> io::Result<FileIdentity> {
        let mut st = MaybeUninit::<libc::stat>::uninit();
        cvt_unit(unsafe {
            libc::fstatat(
                self.as_fd().as_raw_fd(),
                name.as_ptr(),
                st.as_mut_ptr(),
                libc::AT_SYMLINK_NOFOLLOW,
            )
        })?;
        Ok(FileIdentity::from_stat(unsafe { &st.assume_init() }))
    }
}

impl<T: AsFd + ?Sized> FdExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::fs::File;
    use std::io::Write;
    use std::os::unix::net::UnixStream;
    use std::thread;
    use std::time::Duration;

    fn scratch(content: &[u8]) -> (tempfile::TempDir, OwnedFd) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch");
        File::create(&path).unwrap().write_all(content).unwrap();
        let file = std::fs::OpenOptions::new().read(true).write(true).open(&path).unwrap();
        (dir, OwnedFd::from(file))
    }

    #[test]
    fn positioned_io_leaves_cursor_alone() {
        let (_dir, fd) = scratch(b"0123456789");
        fd.seek_to(2, Whence::Set).unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(fd.read_exact_at(&mut buf, 5).unwrap(), 3);
        assert_eq!(&buf, b"567");
        assert_eq!(fd.write_all_at(b"ab", 0).unwrap(), 2);
        assert_eq!(fd.cursor().unwrap(), 2);

        assert_eq!(fd.read_at_least(&mut buf, 3).unwrap(), 3);
        assert_eq!(&buf, b"234");
        assert_eq!(fd.cursor().unwrap(), 5);
    }

    #[test]
    fn read_exact_at_reports_eof() {
        let (_dir, fd) = scratch(b"abc");
        let mut buf = [0u8; 8];
        let err = fd.read_exact_at(&mut buf, 0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn stat_at_matches_fstat() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"a").unwrap();
        let dirfd = OwnedFd::from(File::open(dir.path()).unwrap());
        let file = OwnedFd::from(File::open(dir.path().join("a")).unwrap());

        let by_name = dirfd.stat_at(&CString::new("a").unwrap()).unwrap();
        let by_fd = file.stat().unwrap();
        assert!(by_name.same_object(&by_fd));
        assert_eq!(by_fd.kind, FileKind::Regular);
        assert_eq!(by_fd.size, 1);
        assert_eq!(dirfd.stat().unwrap().kind, FileKind::Directory);
    }

    #[test]
    fn closed_descriptor_is_not_open() {
        let (_dir, fd) = scratch(b"x");
        let raw = fd.as_raw_fd();
        assert!(fd_is_open(raw).unwrap());
        close(fd).unwrap();
        assert!(!fd_is_open(raw).unwrap());
    }

    #[test]
    fn shutdown_on_regular_file_is_not_a_socket() {
        let (_dir, fd) = scratch(b"x");
        let err = raw_shutdown(fd.as_raw_fd()).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOTSOCK));
    }

    #[test]
    fn single_byte_steps_advance_until_done() {
        let mut offsets = Vec::new();
        let total = accumulate(5, io::ErrorKind::WriteZero, "pwrite", |done| {
            offsets.push(done);
            Ok(1)
        })
        .unwrap();
        assert_eq!(total, 5);
        assert_eq!(offsets, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn zero_step_midway_is_reported_with_progress() {
        for kind in [io::ErrorKind::WriteZero, io::ErrorKind::UnexpectedEof] {
            let mut calls = 0;
            let err = accumulate(6, kind, "pread", |_| {
                calls += 1;
                Ok(if calls < 3 { 2 } else { 0 })
            })
            .unwrap_err();
            assert_eq!(err.kind(), kind);
            assert!(err.to_string().contains("after 4 of 6"), "{}", err);
            assert_eq!(calls, 3);
        }
    }

    #[test]
    fn step_errors_propagate_unchanged() {
        let err = accumulate(3, io::ErrorKind::WriteZero, "pwrite", |_| {
            Err(io::Error::from_raw_os_error(libc::EIO))
        })
        .unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EIO));
    }

    #[test]
    fn read_at_least_waits_for_a_second_chunk() {
        let (reader, mut writer) = UnixStream::pair().unwrap();
        writer.write_all(b"ab").unwrap();
        let late = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            writer.write_all(b"cd").unwrap();
        });

        let mut buf = [0u8; 8];
        let n = reader.read_at_least(&mut buf, 4).unwrap();
        late.join().unwrap();
        assert_eq!(n, 4);
        assert_eq!(&buf[..4], b"abcd");
    }

    #[test]
    fn read_at_least_reports_a_peer_that_hangs_up_early() {
        let (reader, mut writer) = UnixStream::pair().unwrap();
        writer.write_all(b"ab").unwrap();
        drop(writer);

        let mut buf = [0u8; 8];
        let err = reader.read_at_least(&mut buf, 4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(err.to_string().contains("read stopped after 2 of 4"), "{}", err);
        assert_eq!(&buf[..2], b"ab");
    }
}
