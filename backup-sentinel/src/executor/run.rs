//! Backup job and run records.

use crate::notify::NotificationEvent;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// Backup job configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupJob {
    /// Stable identifier, used for the per-job busy flag
    pub id: String,

    /// Directory whose top-level entries are backed up
    pub source: PathBuf,

    /// Parent of the timestamped backup folders
    pub destination_root: PathBuf,
}

impl BackupJob {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<PathBuf>,
        destination_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            destination_root: destination_root.into(),
        }
    }
}

/// Final state of a backup run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every non-skipped entry was copied
    Success,

    /// At least one entry failed; the rest were copied
    PartialFailure,

    /// Shutdown was requested between entries
    Interrupted,

    /// The source could not be listed or the backup folder not created
    Fatal { error: String },
}

/// One execution of the snapshot copier
#[derive(Debug, Clone)]
pub struct BackupRun {
    pub started_at: DateTime<Local>,
    pub source: PathBuf,

    /// Timestamped folder this run writes into
    pub backup_path: PathBuf,

    /// Top-level entries listed in the source
    pub entries_total: usize,
    pub entries_skipped: usize,
    pub entries_failed: usize,

    pub files_copied: usize,
    pub bytes_copied: u64,
    pub duration: Duration,
    pub outcome: RunOutcome,
}

impl BackupRun {
    pub(crate) fn start(started_at: DateTime<Local>, source: &Path, backup_path: PathBuf) -> Self {
        Self {
            started_at,
            source: source.to_path_buf(),
            backup_path,
            entries_total: 0,
            entries_skipped: 0,
            entries_failed: 0,
            files_copied: 0,
            bytes_copied: 0,
            duration: Duration::ZERO,
            outcome: RunOutcome::Success,
        }
    }

    /// A run that ended before any entry was processed
    pub fn fatal(
        started_at: DateTime<Local>,
        source: &Path,
        backup_path: PathBuf,
        error: impl ToString,
    ) -> Self {
        let mut run = Self::start(started_at, source, backup_path);
        run.outcome = RunOutcome::Fatal {
            error: error.to_string(),
        };
        run
    }

    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    /// Human-readable summary sent to the notifier
    pub fn notification(&self) -> NotificationEvent {
        let path = self.backup_path.display();
        match &self.outcome {
            RunOutcome::Success => NotificationEvent::new(
                "Backup Completed",
                format!("Backup completed successfully at {path}"),
            ),
            RunOutcome::PartialFailure => NotificationEvent::new(
                "Backup Completed With Errors",
                format!(
                    "Backup completed at {path} with {} of {} entries failed",
                    self.entries_failed, self.entries_total
                ),
            ),
            RunOutcome::Interrupted => NotificationEvent::new(
                "Backup Interrupted",
                format!("Backup at {path} was interrupted by shutdown"),
            ),
            RunOutcome::Fatal { error } => NotificationEvent::new(
                "Backup Failed",
                format!("Backup failed with error: {error}"),
            ),
        }
    }

    /// Emit the completion record for this run
    pub fn log_summary(&self) {
        let path = self.backup_path.display();
        match &self.outcome {
            RunOutcome::Success => info!(
                backup_path = %self.backup_path.display(),
                entries_total = self.entries_total,
                entries_skipped = self.entries_skipped,
                files_copied = self.files_copied,
                bytes_copied = self.bytes_copied,
                duration_ms = self.duration.as_millis() as u64,
                "Backup successful: {}",
                path
            ),
            RunOutcome::PartialFailure | RunOutcome::Interrupted => warn!(
                backup_path = %self.backup_path.display(),
                entries_total = self.entries_total,
                entries_skipped = self.entries_skipped,
                entries_failed = self.entries_failed,
                files_copied = self.files_copied,
                bytes_copied = self.bytes_copied,
                outcome = ?self.outcome,
                "Backup finished with problems: {}",
                path
            ),
            RunOutcome::Fatal { error } => error!(
                source = %self.source.display(),
                "Backup failed: {}",
                error
            ),
        }
    }
}
