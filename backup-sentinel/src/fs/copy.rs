//! File and subtree copying for snapshot runs.

use crate::fs::walker::is_hidden;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Filesystem operations a snapshot run performs on the destination side
pub trait CopyBackend: Send + Sync {
    /// Copy `from` to `to`, replacing `to` if it exists. Returns bytes copied.
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64>;

    /// Create `path` and any missing parents
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// `std::fs` backed copying
#[derive(Debug, Default, Clone, Copy)]
pub struct StdCopy;

impl CopyBackend for StdCopy {
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<u64> {
        std::fs::copy(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }
}

/// Outcome of copying one directory subtree
#[derive(Debug, Default)]
pub struct TreeCopyReport {
    pub files_copied: usize,
    pub bytes_copied: u64,

    /// Hidden entries pruned plus links and special files left behind
    pub skipped: usize,

    /// Paths that failed, each already logged
    pub failures: Vec<(PathBuf, io::Error)>,
}

impl TreeCopyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Recursively copy `src` into `dst`, preserving structure
///
/// Hidden entries are pruned at every depth, as is `exclude` when given.
/// Symlinks are never followed and, like other special files, are skipped
/// with a warning. A failing path is logged and recorded; the walk continues
/// with its siblings.
pub fn copy_tree(
    backend: &dyn CopyBackend,
    src: &Path,
    dst: &Path,
    exclude: Option<&Path>,
) -> TreeCopyReport {
    let mut report = TreeCopyReport::default();

    let walker = WalkDir::new(src)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            if exclude.is_some_and(|path| entry.path() == path) {
                warn!(path = %entry.path().display(), "Backup root inside subtree, skipping");
                return false;
            }
            !is_hidden(entry.file_name())
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| src.to_path_buf());
                let error = io::Error::from(e);
                warn!(path = %path.display(), error = %error, "Failed to read entry, skipping");
                report.failures.push((path, error));
                continue;
            }
        };

        let relative = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dst.join(relative);
        let file_type = entry.file_type();

        let result = if file_type.is_dir() {
            backend.create_dir_all(&target)
        } else if file_type.is_file() {
            backend.copy_file(entry.path(), &target).map(|bytes| {
                report.files_copied += 1;
                report.bytes_copied += bytes;
            })
        } else {
            warn!(path = %entry.path().display(), "Not a regular file or directory, skipping");
            report.skipped += 1;
            Ok(())
        };

        if let Err(error) = result {
            warn!(path = %entry.path().display(), error = %error, "Failed to copy, skipping");
            report.failures.push((entry.path().to_path_buf(), error));
        }
    }

    report
}
