//! Request-scoped scratch directories.

use std::io;
use std::path::Path;
use tempfile::TempDir;

/// Uniquely named scratch directory owning one request's files.
///
/// Dropping the value removes the directory and everything in it;
/// removal errors are ignored, matching the best-effort cleanup
/// contract for transient storage.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under `parent`, or under the system temp
    /// directory when `parent` is `None`.
    pub fn create(parent: Option<&Path>) -> io::Result<Self> {
        let dir = match parent {
            Some(parent) => tempfile::Builder::new()
                .prefix("linkfetch-")
                .tempdir_in(parent)?,
            None => tempfile::Builder::new().prefix("linkfetch-").tempdir()?,
        };
        Ok(Self { dir })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
