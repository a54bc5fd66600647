//! Per-job busy flags that keep two runs of one job from overlapping.

use dashmap::DashSet;
use std::sync::Arc;

/// Tracks which jobs currently have a run in flight
#[derive(Clone, Default)]
pub struct JobTracker {
    running: Arc<DashSet<String>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `job_id` busy. Returns `None` if a run of that job is already in flight.
    pub fn try_begin(&self, job_id: &str) -> Option<RunGuard> {
        if self.running.insert(job_id.to_string()) {
            Some(RunGuard {
                running: Arc::clone(&self.running),
                job_id: job_id.to_string(),
            })
        } else {
            None
        }
    }

    pub fn is_running(&self, job_id: &str) -> bool {
        self.running.contains(job_id)
    }

    /// Get count of running jobs
    pub fn running_count(&self) -> usize {
        self.running.len()
    }
}

/// Clears the job's busy flag when dropped
pub struct RunGuard {
    running: Arc<DashSet<String>>,
    job_id: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.remove(&self.job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_begin_rejected_until_drop() {
        let tracker = JobTracker::new();
        let guard = tracker.try_begin("nightly").expect("first begin");
        assert!(tracker.is_running("nightly"));
        assert!(tracker.try_begin("nightly").is_none());

        drop(guard);
        assert!(!tracker.is_running("nightly"));
        assert!(tracker.try_begin("nightly").is_some());
    }

    #[test]
    fn test_jobs_are_independent() {
        let tracker = JobTracker::new();
        let _a = tracker.try_begin("a").unwrap();
        let _b = tracker.try_begin("b").unwrap();
        assert_eq!(tracker.running_count(), 2);
    }
}
