//! Temporary cache file locations for tests.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A path inside a private temporary directory that is removed on drop.
///
/// The file itself is not created, which lets tests exercise both the
/// "missing file" and "written file" cases.
#[derive(Debug)]
pub struct TempCachePath {
    _dir: TempDir,
    path: PathBuf,
}

impl TempCachePath {
    /// Reserve `file_name` in a fresh temporary directory.
    pub fn new(file_name: &str) -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("resync-cache").tempdir()?;
        let path = dir.path().join(file_name);
        Ok(Self { _dir: dir, path })
    }

    /// Full path of the reserved file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
