//! Periodic backup triggers.
//!
//! The scheduler owns an explicit list of trigger rules. A polling loop
//! checks them every `poll_interval` and dispatches due jobs to the runner,
//! so a long copy never delays the next poll. A rule that comes due while
//! its previous run is still going skips that occurrence. Missed occurrences
//! (process not running, machine asleep) are not replayed.

pub mod cadence;

pub use cadence::Cadence;

use crate::executor::{BackupJob, BackupRunner};
use chrono::{DateTime, Local};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// A cadence bound to a backup job
#[derive(Debug, Clone)]
pub struct TriggerRule {
    pub cadence: Cadence,
    pub job: BackupJob,
    next_fire: DateTime<Local>,
}

impl TriggerRule {
    pub fn new(cadence: Cadence, job: BackupJob, now: DateTime<Local>) -> Self {
        Self {
            next_fire: cadence.next_after(&now),
            cadence,
            job,
        }
    }

    pub fn next_fire(&self) -> DateTime<Local> {
        self.next_fire
    }

    pub fn is_due(&self, now: &DateTime<Local>) -> bool {
        self.next_fire <= *now
    }
}

pub struct Scheduler {
    rules: Vec<TriggerRule>,
    runner: BackupRunner,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(runner: BackupRunner, poll_interval: Duration) -> Self {
        Self {
            rules: Vec::new(),
            runner,
            poll_interval,
        }
    }

    /// Register a rule; its first fire is the next occurrence after now
    pub fn add_rule(&mut self, cadence: Cadence, job: BackupJob) {
        let rule = TriggerRule::new(cadence, job, Local::now());
        info!(
            job_id = %rule.job.id,
            cadence = %rule.cadence,
            next_fire = %rule.next_fire.format("%Y-%m-%d %H:%M:%S"),
            "Job scheduled"
        );
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[TriggerRule] {
        &self.rules
    }

    /// Dispatch every rule due at `now` and schedule its next occurrence
    ///
    /// Returns how many runs were started.
    pub fn tick(&mut self, now: DateTime<Local>) -> usize {
        let mut started = 0;
        for rule in self.rules.iter_mut().filter(|rule| rule.is_due(&now)) {
            if self.runner.dispatch(rule.job.clone()).is_some() {
                info!(job_id = %rule.job.id, "Started scheduled backup");
                started += 1;
            }
            rule.next_fire = rule.cadence.next_after(&now);
        }
        started
    }

    /// Poll until `shutdown` is cancelled
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(rules = self.rules.len(), "Scheduler started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick(Local::now());
                }
            }
        }

        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SnapshotCopier;
    use crate::notify::testing::RecordingNotifier;
    use chrono::{NaiveTime, TimeDelta};
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn runner(notifier: Arc<RecordingNotifier>) -> BackupRunner {
        BackupRunner::new(SnapshotCopier::new(CancellationToken::new()), notifier)
    }

    fn daily_at_two() -> Cadence {
        Cadence::Daily(NaiveTime::from_hms_opt(2, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_rule_not_due_before_next_fire() {
        let mut scheduler = Scheduler::new(runner(Arc::default()), Duration::from_secs(1));
        scheduler.add_rule(daily_at_two(), BackupJob::new("nightly", "/src", "/dst"));

        let before = scheduler.rules()[0].next_fire() - TimeDelta::seconds(1);
        assert_eq!(scheduler.tick(before), 0);
    }

    #[tokio::test]
    async fn test_due_rule_runs_and_reschedules() -> anyhow::Result<()> {
        let src = TempDir::new()?;
        let dst = TempDir::new()?;
        fs::write(src.path().join("a.txt"), "hello")?;

        let notifier = Arc::new(RecordingNotifier::default());
        let runner = runner(notifier.clone());
        let mut scheduler = Scheduler::new(runner.clone(), Duration::from_secs(1));
        scheduler.add_rule(daily_at_two(), BackupJob::new("nightly", src.path(), dst.path()));

        let fire = scheduler.rules()[0].next_fire();
        let now = fire + TimeDelta::seconds(1);
        assert_eq!(scheduler.tick(now), 1);

        let next = scheduler.rules()[0].next_fire();
        assert!(next > now);
        assert_eq!(next.time(), NaiveTime::from_hms_opt(2, 0, 0).unwrap());

        // Same instant again: nothing due any more
        assert_eq!(scheduler.tick(now), 0);

        runner.drain().await;
        assert_eq!(notifier.events().len(), 1);
        assert_eq!(fs::read_dir(dst.path())?.count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_busy_job_skips_occurrence() {
        let runner = runner(Arc::default());
        let mut scheduler = Scheduler::new(runner.clone(), Duration::from_secs(1));
        scheduler.add_rule(daily_at_two(), BackupJob::new("nightly", "/src", "/dst"));

        let _busy = runner.job_tracker().try_begin("nightly").unwrap();
        let now = scheduler.rules()[0].next_fire() + TimeDelta::seconds(1);

        assert_eq!(scheduler.tick(now), 0);
        assert_eq!(runner.in_flight(), 0);
        assert!(scheduler.rules()[0].next_fire() > now);
    }

    #[tokio::test]
    async fn test_long_gap_fires_once() {
        let notifier = Arc::new(RecordingNotifier::default());
        let runner = runner(notifier.clone());
        let mut scheduler = Scheduler::new(runner.clone(), Duration::from_secs(1));
        let job = BackupJob::new("nightly", "/missing/src", "/missing/dst");
        scheduler.add_rule(daily_at_two(), job);

        // Three days late: one run, then the next natural occurrence
        let now = scheduler.rules()[0].next_fire() + TimeDelta::days(3);
        assert_eq!(scheduler.tick(now), 1);
        assert!(scheduler.rules()[0].next_fire() > now);
        assert!(scheduler.rules()[0].next_fire() <= now + TimeDelta::days(1));

        runner.drain().await;
        assert_eq!(notifier.events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_stops_on_shutdown() {
        let scheduler = Scheduler::new(runner(Arc::default()), Duration::from_secs(1));
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(3)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("scheduler exits within one poll interval")
            .unwrap();
    }
}
