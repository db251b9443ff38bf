// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Granted-directory access model.
//!
//! A probe only reaches the filesystem through directories it was granted
//! up front. Paths are resolved lexically against those grants and opened
//! with `openat` relative to the granted descriptor, so a probe with no
//! grants cannot open anything at all.

use std::ffi::CString;
use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::ErrorClass;
use crate::sys::{FdExt, Stream};

const CREATE_MODE: libc::mode_t = 0o644;

#[derive(thiserror::Error, Debug)]
pub enum AccessError {
    #[error("{path}: no granted directory contains this path")]
    NotGranted { path: String },

    #[error("{path}: not permitted ({reason})")]
    NotCapable { path: String, reason: &'static str },

    #[error("{path}: {source}")]
    Os {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl AccessError {
    /// Outside every grant reads as a missing entry; an escape attempt as a
    /// capability refusal.
    pub fn class(&self) -> ErrorClass {
        match self {
            AccessError::NotGranted { .. } => ErrorClass::NoEntry,
            AccessError::NotCapable { .. } => ErrorClass::NotCapable,
            AccessError::Os { source, .. } => ErrorClass::of(source),
        }
    }

    fn os(path: &str, source: io::Error) -> Self {
        AccessError::Os {
            path: path.to_string(),
            source,
        }
    }
}

#[derive(Debug)]
struct Grant {
    name: PathBuf,
    dir: OwnedFd,
}

/// A path that landed inside a grant.
#[derive(Debug)]
struct Resolved<'a> {
    grant: &'a Grant,
    rest: CString,
}

/// The set of directories a probe may reach.
#[derive(Debug, Default)]
pub struct Preopens {
    grants: Vec<Grant>,
}

impl Preopens {
    pub fn none() -> Self {
        Self::default()
    }

    /// Open `host_base/name` and make it reachable under `name`.
    pub fn grant(&mut self, host_base: &Path, name: &str) -> Result<(), AccessError> {
        let components = normal_components(Path::new(name))
            .filter(|parts| !parts.is_empty())
            .ok_or_else(|| AccessError::NotCapable {
                path: name.to_string(),
                reason: "grant name must be a plain relative path",
            })?;

        let host = host_base.join(name);
        let dir = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_DIRECTORY | libc::O_CLOEXEC)
            .open(&host)
            .map_err(|source| AccessError::os(name, source))?;

        debug!(grant = name, host = %host.display(), fd = dir.as_raw_fd(), "granted directory");
        self.grants.push(Grant {
            name: components.iter().collect(),
            dir: OwnedFd::from(dir),
        });
        Ok(())
    }

    fn resolve(&self, path: &str) -> Result<Resolved<'_>, AccessError> {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            return Err(AccessError::NotCapable {
                path: path.to_string(),
                reason: "absolute path",
            });
        }

        let components: Vec<Component<'_>> = candidate
            .components()
            .filter(|component| *component != Component::CurDir)
            .collect();

        // Longest component-wise prefix wins.
        let matched = self
            .grants
            .iter()
            .filter_map(|grant| {
                let depth = grant.name.components().count();
                let prefix_matches = components.len() >= depth
                    && grant.name.components().zip(&components).all(|(a, b)| a == *b);
                prefix_matches.then_some((grant, depth))
            })
            .max_by_key(|(_, depth)| *depth);

        let Some((grant, depth)) = matched else {
            if components.contains(&Component::ParentDir) {
                return Err(AccessError::NotCapable {
                    path: path.to_string(),
                    reason: "parent traversal outside any granted directory",
                });
            }
            return Err(AccessError::NotGranted {
                path: path.to_string(),
            });
        };

        let below: PathBuf = components[depth..].iter().collect();
        let rest = normal_components(&below)
            .ok_or_else(|| AccessError::NotCapable {
                path: path.to_string(),
                reason: "escapes granted directory",
            })?;

        let mut bytes = Vec::new();
        for (i, part) in rest.iter().enumerate() {
            if i > 0 {
                bytes.push(b'/');
            }
            bytes.extend_from_slice(part.as_bytes());
        }
        if bytes.is_empty() {
            bytes.push(b'.');
        }
        let rest = CString::new(bytes).map_err(|_| {
            AccessError::os(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"),
            )
        })?;

        Ok(Resolved { grant, rest })
    }

    /// `openat(grant, rest, flags | O_CLOEXEC, mode)`
    pub fn open(
        &self,
        path: &str,
        flags: libc::c_int,
        mode: libc::mode_t,
    ) -> Result<OwnedFd, AccessError> {
        let resolved = self.resolve(path)?;
        let fd = unsafe {
            libc::openat(
                resolved.grant.dir.as_raw_fd(),
                resolved.rest.as_ptr(),
                flags | libc::O_CLOEXEC,
                libc::c_uint::from(mode),
            )
        };
        if fd < 0 {
            return Err(AccessError::os(path, io::Error::last_os_error()));
        }
        debug!(path, fd, grant = %resolved.grant.name.display(), "opened");
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    pub fn open_dir(&self, path: &str) -> Result<OwnedFd, AccessError> {
        self.open(path, libc::O_RDONLY | libc::O_DIRECTORY, 0)
    }

    /// Open with a C stdio mode string and wrap the descriptor in a stream.
    pub fn fopen(&self, path: &str, mode: &str) -> Result<Stream, AccessError> {
        let flags = stdio_flags(mode).ok_or_else(|| {
            AccessError::os(
                path,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unsupported stream mode {:?}", mode),
                ),
            )
        })?;
        let fd = self.open(path, flags, CREATE_MODE)?;
        Stream::from_fd(fd, mode).map_err(|source| AccessError::os(path, source))
    }

    /// Whether the path names an existing entry; symlinks are not followed.
    pub fn exists(&self, path: &str) -> Result<bool, AccessError> {
        let resolved = self.resolve(path)?;
        match resolved.grant.dir.stat_at(&resolved.rest) {
            Ok(_) => Ok(true),
            Err(err) if err.raw_os_error() == Some(libc::ENOENT) => Ok(false),
            Err(err) => Err(AccessError::os(path, err)),
        }
    }

    /// `unlinkat(grant, rest, 0)`
    pub fn remove(&self, path: &str) -> Result<(), AccessError> {
        let resolved = self.resolve(path)?;
        let ret = unsafe {
            libc::unlinkat(resolved.grant.dir.as_raw_fd(), resolved.rest.as_ptr(), 0)
        };
        if ret != 0 {
            return Err(AccessError::os(path, io::Error::last_os_error()));
        }
        debug!(path, "removed");
        Ok(())
    }
}

/// Lexically normalise a relative path. `None` when `..` climbs above the
/// starting point or the path is absolute.
fn normal_components(path: &Path) -> Option<Vec<&std::ffi::OsStr>> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts)
}

/// `fopen` mode string to `open` flags. A `b` anywhere is ignored.
fn stdio_flags(mode: &str) -> Option<libc::c_int> {
    let mode: String = mode.chars().filter(|c| *c != 'b').collect();
    let flags = match mode.as_str() {
        "r" => libc::O_RDONLY,
        "r+" => libc::O_RDWR,
        "w" => libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
        "w+" => libc::O_RDWR | libc::O_CREAT | libc::O_TRUNC,
        "a" => libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND,
        "a+" => libc::O_RDWR | libc::O_CREAT | libc::O_APPEND,
        _ => return None,
    };
    Some(flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (tempfile::TempDir, Preopens) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("data/nested")).unwrap();
        std::fs::write(dir.path().join("data/a.txt"), b"a").unwrap();
        std::fs::write(dir.path().join("data/nested/b.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("outside.txt"), b"o").unwrap();

        let mut preopens = Preopens::none();
        preopens.grant(dir.path(), "data").unwrap();
        (dir, preopens)
    }

    #[test]
    fn nothing_is_reachable_without_grants() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file"), b"x").unwrap();

        let err = Preopens::none().open("file", libc::O_RDONLY, 0).unwrap_err();
        assert_eq!(err.class(), ErrorClass::NoEntry);
    }

    #[test]
    fn opens_inside_grant() {
        let (_dir, preopens) = tree();
        let fd = preopens.open("data/nested/b.txt", libc::O_RDONLY, 0).unwrap();
        let mut buf = [0u8; 1];
        assert_eq!(fd.read_raw(&mut buf).unwrap(), 1);
        assert_eq!(&buf, b"b");

        assert!(preopens.exists("./data/a.txt").unwrap());
        assert!(preopens.exists("data/nested/../a.txt").unwrap());
        assert!(!preopens.exists("data/missing").unwrap());
    }

    #[test]
    fn ungranted_sibling_is_no_entry() {
        let (_dir, preopens) = tree();
        let err = preopens.open("outside.txt", libc::O_RDONLY, 0).unwrap_err();
        assert!(matches!(err, AccessError::NotGranted { .. }));
        assert_eq!(err.class(), ErrorClass::NoEntry);
    }

    #[test]
    fn escapes_are_not_capable() {
        let (_dir, preopens) = tree();
        for path in ["data/../outside.txt", "data/nested/../../outside.txt", "../x", "/etc/passwd"] {
            let err = preopens.open(path, libc::O_RDONLY, 0).unwrap_err();
            assert_eq!(err.class(), ErrorClass::NotCapable, "{}", path);
        }
    }

    #[test]
    fn longest_grant_wins() {
        let (dir, mut preopens) = tree();
        preopens.grant(dir.path(), "data/nested").unwrap();
        let resolved = preopens.resolve("data/nested/b.txt").unwrap();
        assert_eq!(resolved.grant.name, Path::new("data/nested"));
        assert_eq!(resolved.rest.to_bytes(), b"b.txt");

        let shallow = preopens.resolve("data/a.txt").unwrap();
        assert_eq!(shallow.grant.name, Path::new("data"));
    }

    #[test]
    fn grant_root_resolves_to_dot() {
        let (_dir, preopens) = tree();
        let resolved = preopens.resolve("data").unwrap();
        assert_eq!(resolved.rest.to_bytes(), b".");
        preopens.open_dir("data").unwrap();
    }

    #[test]
    fn fopen_creates_and_remove_unlinks() {
        let (dir, preopens) = tree();
        let mut stream = preopens.fopen("data/new.cleanup", "w").unwrap();
        stream.write(b"hello").unwrap();
        stream.close().unwrap();
        assert_eq!(std::fs::read(dir.path().join("data/new.cleanup")).unwrap(), b"hello");

        preopens.remove("data/new.cleanup").unwrap();
        assert!(!preopens.exists("data/new.cleanup").unwrap());

        let err = preopens.remove("data/new.cleanup").unwrap_err();
        assert_eq!(err.class(), ErrorClass::NoEntry);
    }

    #[test]
    fn rejects_bad_grants_and_modes() {
        let (dir, mut preopens) = tree();
        assert!(matches!(
            preopens.grant(dir.path(), "../up").unwrap_err(),
            AccessError::NotCapable { .. }
        ));
        assert_eq!(
            preopens.grant(dir.path(), "outside.txt").unwrap_err().class(),
            ErrorClass::Other(nix::errno::Errno::ENOTDIR)
        );
        assert!(preopens.fopen("data/a.txt", "rw").is_err());
        assert_eq!(stdio_flags("rb"), Some(libc::O_RDONLY));
    }
}
