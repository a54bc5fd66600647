//! Backup job executor - snapshots a source directory into a timestamped folder.
//!
//! A run lists the top level of the source, claims a fresh
//! `backup_<YYYYMMDD_HHMMSS>` folder under the destination root and then
//! handles each entry in listing order:
//! - hidden entries (leading `.`) are skipped
//! - regular files are copied
//! - directories are copied recursively
//! - links and special files are skipped with a warning
//!
//! A failing entry is logged and counted; only a failure to list the source
//! or to create the backup folder ends the run early.

pub mod run;
pub mod runner;
pub mod tracker;

pub use run::{BackupJob, BackupRun, RunOutcome};
pub use runner::BackupRunner;
pub use tracker::{JobTracker, RunGuard};

use crate::fs::copy::{copy_tree, CopyBackend, StdCopy};
use crate::fs::walker::{list_top_level, EntryKind, ListingError, SourceEntry};
use crate::utils::errors::SentinelError;
use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Prefix of every backup folder name
pub const BACKUP_FOLDER_PREFIX: &str = "backup_";

/// Same-second collisions get `_1`, `_2`, ... up to this many attempts
const MAX_FOLDER_SUFFIX: u32 = 1000;

/// Folder name for a run started at `started_at`
pub fn backup_folder_name(started_at: &DateTime<Local>) -> String {
    format!("{BACKUP_FOLDER_PREFIX}{}", started_at.format("%Y%m%d_%H%M%S"))
}

/// Copies a source directory's top level into a new timestamped folder
pub struct SnapshotCopier {
    backend: Arc<dyn CopyBackend>,
    shutdown: CancellationToken,
}

impl SnapshotCopier {
    /// Create a copier backed by `std::fs`
    pub fn new(shutdown: CancellationToken) -> Self {
        Self::with_backend(Arc::new(StdCopy), shutdown)
    }

    pub fn with_backend(backend: Arc<dyn CopyBackend>, shutdown: CancellationToken) -> Self {
        Self { backend, shutdown }
    }

    /// Back up `source` into a new folder under `backup_root`, stamped now
    pub fn run(&self, source: &Path, backup_root: &Path) -> BackupRun {
        self.run_at(source, backup_root, Local::now())
    }

    /// Back up `source` with an explicit start time
    ///
    /// Blocks on filesystem I/O; call from a blocking context.
    pub fn run_at(
        &self,
        source: &Path,
        backup_root: &Path,
        started_at: DateTime<Local>,
    ) -> BackupRun {
        let clock = Instant::now();
        let planned_path = backup_root.join(backup_folder_name(&started_at));

        info!(
            source = %source.display(),
            backup_root = %backup_root.display(),
            "Starting backup"
        );

        let entries = match list_top_level(source) {
            Ok(entries) => entries,
            Err(source_err) => {
                let err = SentinelError::SourceUnreadable {
                    path: source.to_path_buf(),
                    source: source_err,
                };
                let mut run = BackupRun::fatal(started_at, source, planned_path, err);
                run.duration = clock.elapsed();
                return run;
            }
        };

        let backup_path = match claim_backup_folder(backup_root, &planned_path) {
            Ok(path) => path,
            Err(source_err) => {
                let err = SentinelError::DestinationUnavailable {
                    path: planned_path.clone(),
                    source: source_err,
                };
                let mut run = BackupRun::fatal(started_at, source, planned_path, err);
                run.duration = clock.elapsed();
                return run;
            }
        };

        let mut run = BackupRun::start(started_at, source, backup_path);
        run.entries_total = entries.len();

        let nested_root = nested_backup_root(source, backup_root);
        if let Some(root) = &nested_root {
            warn!(
                backup_root = %root.display(),
                "Backup root is inside the source and will not be copied"
            );
        }
        let interrupted = self.copy_entries(entries, nested_root.as_deref(), &mut run);

        run.outcome = if interrupted {
            RunOutcome::Interrupted
        } else if run.entries_failed == 0 {
            RunOutcome::Success
        } else {
            RunOutcome::PartialFailure
        };
        run.duration = clock.elapsed();
        run
    }

    /// Copy each listed entry into `run.backup_path`, updating the run's counters
    ///
    /// Returns true if shutdown was observed before every entry was handled.
    /// When `nested_root` is set nothing under it is copied, so a run never
    /// backs up its own output or earlier backups.
    fn copy_entries(
        &self,
        entries: Vec<Result<SourceEntry, ListingError>>,
        nested_root: Option<&Path>,
        run: &mut BackupRun,
    ) -> bool {
        for entry in entries {
            if self.shutdown.is_cancelled() {
                return true;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(listing) => {
                    warn!(
                        path = %listing.path.display(),
                        error = %listing.error,
                        "Cannot read entry, skipping"
                    );
                    run.entries_failed += 1;
                    continue;
                }
            };

            let target = run.backup_path.join(&entry.name);
            match entry.kind {
                EntryKind::Hidden => {
                    info!(path = %entry.path.display(), "Skipping hidden entry");
                    run.entries_skipped += 1;
                }
                EntryKind::Other => {
                    warn!(
                        path = %entry.path.display(),
                        "Not a regular file or directory, skipping"
                    );
                    run.entries_skipped += 1;
                }
                EntryKind::File => match self.backend.copy_file(&entry.path, &target) {
                    Ok(bytes) => {
                        run.files_copied += 1;
                        run.bytes_copied += bytes;
                    }
                    Err(e) => {
                        log_entry_failure(&entry.path, &e);
                        run.entries_failed += 1;
                    }
                },
                EntryKind::Directory => {
                    let exclude = nested_root.and_then(|root| excluded_path(&entry.path, root));
                    if exclude.as_deref() == Some(entry.path.as_path()) {
                        warn!(path = %entry.path.display(), "Entry holds backups, skipping");
                        run.entries_skipped += 1;
                        continue;
                    }

                    let report = copy_tree(
                        self.backend.as_ref(),
                        &entry.path,
                        &target,
                        exclude.as_deref(),
                    );
                    run.files_copied += report.files_copied;
                    run.bytes_copied += report.bytes_copied;
                    if !report.is_clean() {
                        warn!(
                            path = %entry.path.display(),
                            failures = report.failures.len(),
                            "Directory copied with failures"
                        );
                        run.entries_failed += 1;
                    }
                }
            }
        }

        false
    }
}

/// Canonical `backup_root` when it lies inside `source`
fn nested_backup_root(source: &Path, backup_root: &Path) -> Option<PathBuf> {
    let source = std::fs::canonicalize(source).ok()?;
    let root = std::fs::canonicalize(backup_root).ok()?;
    root.starts_with(&source).then_some(root)
}

/// Path under `dir` to leave out of the copy, given the canonical backup root
///
/// `dir` itself when it is the root or a backup folder directly inside it,
/// the root when it lies below `dir`, otherwise nothing. The result is built
/// on `dir` as given so it matches the paths a walk of `dir` yields.
fn excluded_path(dir: &Path, root: &Path) -> Option<PathBuf> {
    let canonical = std::fs::canonicalize(dir).ok()?;
    let is_backup_folder = canonical.parent() == Some(root)
        && canonical
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with(BACKUP_FOLDER_PREFIX));
    if is_backup_folder {
        return Some(dir.to_path_buf());
    }

    let relative = root.strip_prefix(&canonical).ok()?;
    Some(dir.join(relative))
}

fn log_entry_failure(path: &Path, error: &io::Error) {
    if error.kind() == io::ErrorKind::PermissionDenied {
        warn!(path = %path.display(), "Permission denied: {}. Skipping...", path.display());
    } else {
        warn!(path = %path.display(), error = %error, "Failed to copy, skipping");
    }
}

/// Create `backup_root` if needed and claim a folder no other run owns
///
/// `planned` is used as-is when free; otherwise a numeric suffix is appended.
fn claim_backup_folder(backup_root: &Path, planned: &Path) -> io::Result<PathBuf> {
    std::fs::create_dir_all(backup_root)?;

    let base = planned
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| BACKUP_FOLDER_PREFIX.to_string());
    let mut candidate = planned.to_path_buf();
    let mut suffix = 0;

    loop {
        match std::fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && suffix < MAX_FOLDER_SUFFIX => {
                suffix += 1;
                candidate = backup_root.join(format!("{base}_{suffix}"));
            }
            Err(e) => return Err(e),
        }
    }
}
