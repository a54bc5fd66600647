//! Runs snapshot jobs off the async threads and reports their outcome.

use super::{BackupJob, BackupRun, JobTracker, SnapshotCopier};
use crate::notify::Notifier;
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Executes backup jobs on their own tasks and sends one notification per run
#[derive(Clone)]
pub struct BackupRunner {
    copier: Arc<SnapshotCopier>,
    notifier: Arc<dyn Notifier>,
    jobs: JobTracker,
    tasks: TaskTracker,
}

impl BackupRunner {
    pub fn new(copier: SnapshotCopier, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            copier: Arc::new(copier),
            notifier,
            jobs: JobTracker::new(),
            tasks: TaskTracker::new(),
        }
    }

    pub fn job_tracker(&self) -> &JobTracker {
        &self.jobs
    }

    /// Execute a backup job to completion
    ///
    /// The copy runs on the blocking pool. The notification is sent after the
    /// completion record is logged and is always the last thing a run does.
    pub async fn execute(&self, job: BackupJob) -> BackupRun {
        let copier = Arc::clone(&self.copier);
        let source = job.source.clone();
        let root = job.destination_root.clone();
        let started_at = Local::now();

        let copy = tokio::task::spawn_blocking(move || copier.run_at(&source, &root, started_at));
        let run = match copy.await {
            Ok(run) => run,
            Err(e) => {
                error!(job_id = %job.id, "Backup task panicked: {}", e);
                BackupRun::fatal(started_at, &job.source, job.destination_root.clone(), e)
            }
        };

        run.log_summary();

        let event = run.notification();
        match self.notifier.notify(&event.subject, &event.body).await {
            Ok(()) => info!(job_id = %job.id, "Notification sent: {}", event.subject),
            Err(e) => error!(job_id = %job.id, error = %e, "Failed to send notification"),
        }

        run
    }

    /// Start a run of `job` unless one is already in flight
    ///
    /// Returns `None` when the job's busy flag is set; the flag is cleared
    /// when the spawned run finishes.
    pub fn dispatch(&self, job: BackupJob) -> Option<JoinHandle<BackupRun>> {
        let Some(guard) = self.jobs.try_begin(&job.id) else {
            warn!(job_id = %job.id, "Skipping run: job already running");
            return None;
        };

        let runner = self.clone();
        Some(self.tasks.spawn(async move {
            let _guard = guard;
            runner.execute(job).await
        }))
    }

    /// Back up `source` into `destination` right now, outside any schedule
    pub fn trigger_backup(
        &self,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> JoinHandle<BackupRun> {
        let job = BackupJob::new("manual", source, destination);
        info!(
            source = %job.source.display(),
            destination = %job.destination_root.display(),
            "Manual backup triggered"
        );

        let runner = self.clone();
        self.tasks.spawn(async move { runner.execute(job).await })
    }

    /// Stop accepting new runs and wait for in-flight ones
    pub async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }
}
