//! Source directory listing and entry classification.
//!
//! Only the top level of the source is listed here; subtrees are walked by
//! [`crate::fs::copy::copy_tree`]. Listing order is whatever the platform's
//! `read_dir` yields and is not sorted.

use std::ffi::{OsStr, OsString};
use std::fs::FileType;
use std::io;
use std::path::{Path, PathBuf};

/// How a source entry is handled by a backup run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Name starts with `.`; never backed up
    Hidden,

    /// Regular file, copied byte-for-byte
    File,

    /// Directory, copied recursively
    Directory,

    /// Symlink, device, socket or fifo; skipped
    Other,
}

impl EntryKind {
    /// Classify by name first, then by the entry's own file type (links are not followed)
    pub fn classify(name: &OsStr, file_type: FileType) -> Self {
        if is_hidden(name) {
            EntryKind::Hidden
        } else if file_type.is_file() {
            EntryKind::File
        } else if file_type.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::Other
        }
    }
}

/// A top-level entry of the source directory
#[derive(Debug, Clone)]
pub struct SourceEntry {
    /// File name within the source directory
    pub name: OsString,

    /// Full path to the entry
    pub path: PathBuf,

    pub kind: EntryKind,
}

/// An entry the listing produced but that could not be inspected
#[derive(Debug)]
pub struct ListingError {
    /// Best-effort path of the broken entry
    pub path: PathBuf,

    pub error: io::Error,
}

/// Names beginning with a dot are hidden
pub fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// List the immediate children of `root`
///
/// # Returns
/// * `Ok(entries)` - one item per child, in listing order; children whose
///   metadata cannot be read are reported as `Err(ListingError)`
/// * `Err(io::Error)` - if `root` is missing, not a directory, or unreadable
pub fn list_top_level(root: &Path) -> io::Result<Vec<Result<SourceEntry, ListingError>>> {
    let reader = std::fs::read_dir(root)?;
    let mut entries = Vec::new();

    for entry in reader {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) => {
                entries.push(Err(ListingError {
                    path: root.to_path_buf(),
                    error,
                }));
                continue;
            }
        };

        let name = entry.file_name();
        let path = entry.path();
        match entry.file_type() {
            Ok(file_type) => {
                let kind = EntryKind::classify(&name, file_type);
                entries.push(Ok(SourceEntry { name, path, kind }));
            }
            Err(error) => entries.push(Err(ListingError { path, error })),
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn kinds(root: &Path) -> Vec<(String, EntryKind)> {
        let mut out: Vec<(String, EntryKind)> = list_top_level(root)
            .unwrap()
            .into_iter()
            .map(|e| {
                let e = e.unwrap();
                (e.name.to_string_lossy().into_owned(), e.kind)
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    #[test]
    fn test_list_empty_directory() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        assert!(list_top_level(temp_dir.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn test_classifies_top_level_only() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("a.txt"), b"hello")?;
        fs::write(temp_dir.path().join(".hidden"), b"secret")?;
        fs::create_dir(temp_dir.path().join("sub"))?;
        fs::write(temp_dir.path().join("sub/b.txt"), b"world")?;

        assert_eq!(
            kinds(temp_dir.path()),
            vec![
                (".hidden".to_string(), EntryKind::Hidden),
                ("a.txt".to_string(), EntryKind::File),
                ("sub".to_string(), EntryKind::Directory),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_hidden_directory_is_hidden() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        fs::create_dir(temp_dir.path().join(".git"))?;
        assert_eq!(kinds(temp_dir.path()), vec![(".git".to_string(), EntryKind::Hidden)]);
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_symlink_is_other() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("target.txt"), b"x")?;
        std::os::unix::fs::symlink(
            temp_dir.path().join("target.txt"),
            temp_dir.path().join("link"),
        )?;

        assert_eq!(
            kinds(temp_dir.path()),
            vec![
                ("link".to_string(), EntryKind::Other),
                ("target.txt".to_string(), EntryKind::File),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_missing_root_is_error() {
        let temp_dir = TempDir::new().unwrap();
        assert!(list_top_level(&temp_dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_file_root_is_error() -> io::Result<()> {
        let temp_dir = TempDir::new()?;
        let file = temp_dir.path().join("plain.txt");
        fs::write(&file, b"x")?;
        assert!(list_top_level(&file).is_err());
        Ok(())
    }
}
