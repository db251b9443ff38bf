// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Reference fixture provider.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::{
    is_cleanup_artifact, FILE, FILE_CONTENT, FOPENDIR_DIR, FOPENDIR_ENTRIES, LSEEK_CONTENT,
    LSEEK_TXT, PREAD_CONTENT, PREAD_TXT, ROOT, WRITEABLE_DIR,
};

/// Errors raised while laying out or resetting the fixture tree
#[derive(thiserror::Error, Debug)]
pub enum FixtureError {
    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

trait IoContext<T> {
    fn during(self, action: &'static str, path: &Path) -> Result<T, FixtureError>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn during(self, action: &'static str, path: &Path) -> Result<T, FixtureError> {
        self.map_err(|source| FixtureError::Io {
            action,
            path: path.to_path_buf(),
            source,
        })
    }
}

/// A provisioned fixture tree rooted at `<base>/fs-tests.dir`.
///
/// Probes run with `base` as their working directory.
#[derive(Debug)]
pub struct FixtureTree {
    base: PathBuf,
    _temp: Option<TempDir>,
}

impl FixtureTree {
    /// Provision into a fresh temporary directory removed on drop.
    pub fn temporary() -> Result<Self, FixtureError> {
        let temp = tempfile::Builder::new()
            .prefix("sc-fixtures-")
            .tempdir()
            .during("create temporary directory for", Path::new("fixture tree"))?;
        Self::provision(temp.path().to_path_buf(), Some(temp))
    }

    /// Lay the fixture tree out under `base`, creating whatever is missing.
    fn provision(base: PathBuf, temp: Option<TempDir>) -> Result<Self, FixtureError> {
        let tree = Self { base, _temp: temp };
        tree.ensure()?;
        Ok(tree)
    }

    /// Directory the probes must run in.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Absolute path of a fixture-relative path such as [`crate::LSEEK_TXT`].
    pub fn path(&self, relative: &str) -> PathBuf {
        self.base.join(relative)
    }

    /// Bring the tree back to its pristine state.
    ///
    /// Removes every `.cleanup` artifact, drops stray entries from the
    /// enumeration directory and rewrites the fixed files. Running it on a
    /// pristine tree changes nothing observable.
    pub fn reset(&self) -> Result<Vec<PathBuf>, FixtureError> {
        let removed = self.sweep_cleanup()?;
        self.prune_fopendir()?;
        self.ensure()?;
        Ok(removed)
    }

    /// Remove every `.cleanup` artifact below the root and return their paths.
    pub fn sweep_cleanup(&self) -> Result<Vec<PathBuf>, FixtureError> {
        let mut removed = Vec::new();
        let root = self.path(ROOT);
        if root.is_dir() {
            sweep_dir(&root, &mut removed)?;
        }
        Ok(removed)
    }

    fn ensure(&self) -> Result<(), FixtureError> {
        for dir in [ROOT, FOPENDIR_DIR, WRITEABLE_DIR] {
            let path = self.path(dir);
            fs::create_dir_all(&path).during("create directory", &path)?;
        }

        for (file, content) in [
            (FILE, FILE_CONTENT),
            (LSEEK_TXT, LSEEK_CONTENT),
            (PREAD_TXT, PREAD_CONTENT),
        ] {
            self.write_if_changed(&self.path(file), content)?;
        }

        let fopendir = self.path(FOPENDIR_DIR);
        for entry in FOPENDIR_ENTRIES {
            self.write_if_changed(&fopendir.join(entry), entry.as_bytes())?;
        }

        debug!(base = %self.base.display(), "fixture tree provisioned");
        Ok(())
    }

    // Rewriting identical content would still bump mtime; skip it.
    fn write_if_changed(&self, path: &Path, content: &[u8]) -> Result<(), FixtureError> {
        match fs::read(path) {
            Ok(existing) if existing == content => Ok(()),
            Ok(_) => fs::write(path, content).during("rewrite", path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                fs::write(path, content).during("write", path)
            }
            Err(err) => Err(err).during("read", path),
        }
    }

    fn prune_fopendir(&self) -> Result<(), FixtureError> {
        let dir = self.path(FOPENDIR_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err).during("list", &dir),
        };

        for entry in entries {
            let entry = entry.during("list", &dir)?;
            let name = entry.file_name();
            let keep = name.to_str().is_some_and(|name| FOPENDIR_ENTRIES.contains(&name));
            if !keep {
                remove_any(&entry.path())?;
            }
        }
        Ok(())
    }
}

fn sweep_dir(dir: &Path, removed: &mut Vec<PathBuf>) -> Result<(), FixtureError> {
    for entry in fs::read_dir(dir).during("list", dir)? {
        let entry = entry.during("list", dir)?;
        let path = entry.path();
        let file_type = entry.file_type().during("stat", &path)?;
        let marked = entry.file_name().to_str().is_some_and(is_cleanup_artifact);

        if marked {
            remove_any(&path)?;
            removed.push(path);
        } else if file_type.is_dir() {
            sweep_dir(&path, removed)?;
        }
    }
    Ok(())
}

fn remove_any(path: &Path) -> Result<(), FixtureError> {
    let meta = fs::symlink_metadata(path).during("stat", path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path).during("remove directory", path)
    } else {
        fs::remove_file(path).during("remove", path)
    }
}
