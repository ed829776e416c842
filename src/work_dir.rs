// Copyright (c) The kyua-runner Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scoped, auto-cleaned work directories for test case execution.

use camino::Utf8Path;
use camino_tempfile::{Builder, Utf8TempDir};
use std::io;

/// A unique, auto-removed directory in which a single test case body or
/// cleanup routine runs.
///
/// Named `kyua.XXXXXX` under `$TMPDIR` (or the system temporary directory
/// if unset), matching the naming the original implementation used so that
/// stray directories left behind by a crash are still recognizable.
pub struct WorkDir {
    dir: Utf8TempDir,
}

impl WorkDir {
    /// Atomically creates a new work directory with a unique name.
    pub fn create() -> io::Result<Self> {
        let base = std::env::var_os("TMPDIR").map(std::path::PathBuf::from).unwrap_or_else(std::env::temp_dir);
        let base = camino::Utf8PathBuf::try_from(base).unwrap_or_else(|_| camino::Utf8PathBuf::from("/tmp"));
        let dir = Builder::new().prefix("kyua.").rand_bytes(6).tempdir_in(base)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Utf8Path {
        self.dir.path()
    }

    /// Persists this directory on disk instead of removing it when dropped,
    /// returning its path. Used by `debug`, where the operator is expected
    /// to inspect what the test case left behind.
    pub fn keep(self) -> camino::Utf8PathBuf {
        self.dir.keep()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_returns_an_existing_directory() {
        let work_dir = WorkDir::create().unwrap();
        assert!(work_dir.path().is_dir());
    }

    #[test]
    fn directory_is_removed_on_drop() {
        let work_dir = WorkDir::create().unwrap();
        let path = work_dir.path().to_owned();
        drop(work_dir);
        assert!(!path.exists());
    }
}
