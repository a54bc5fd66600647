//! Background host resource monitor.
//!
//! Samples CPU, memory, disk and optionally network counters on a fixed
//! interval and logs one record per sample. Shares nothing with the backup
//! side except the shutdown token.

pub mod host;

pub use host::HostMetrics;

use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("{0} metrics unavailable")]
    Unavailable(&'static str),

    #[error("No disk found for {}", .0.display())]
    DiskNotFound(PathBuf),
}

/// Summed byte counters across all network interfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkCounters {
    pub received_bytes: u64,
    pub transmitted_bytes: u64,
}

/// One reading of host resource usage
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSample {
    pub sampled_at: DateTime<Local>,
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub network: Option<NetworkCounters>,
}

impl ResourceSample {
    /// Percentages are clamped to `[0, 100]`; NaN reads as 0
    pub fn new(
        cpu_percent: f64,
        memory_percent: f64,
        disk_percent: f64,
        network: Option<NetworkCounters>,
    ) -> Self {
        Self {
            sampled_at: Local::now(),
            cpu_percent: clamp_percent(cpu_percent),
            memory_percent: clamp_percent(memory_percent),
            disk_percent: clamp_percent(disk_percent),
            network,
        }
    }

    pub fn log(&self) {
        match self.network {
            Some(net) => info!(
                target: "monitor",
                cpu_percent = self.cpu_percent,
                memory_percent = self.memory_percent,
                disk_percent = self.disk_percent,
                net_rx_bytes = net.received_bytes,
                net_tx_bytes = net.transmitted_bytes,
                "CPU: {:.1}%, Memory: {:.1}%, Disk: {:.1}%",
                self.cpu_percent,
                self.memory_percent,
                self.disk_percent
            ),
            None => info!(
                target: "monitor",
                cpu_percent = self.cpu_percent,
                memory_percent = self.memory_percent,
                disk_percent = self.disk_percent,
                "CPU: {:.1}%, Memory: {:.1}%, Disk: {:.1}%",
                self.cpu_percent,
                self.memory_percent,
                self.disk_percent
            ),
        }
    }
}

/// Percentage of `part` in `whole`, 0 when `whole` is 0
pub fn percent_of(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Where samples come from
pub trait MetricsSource: Send {
    /// Called at the start of the CPU averaging window
    fn begin_cpu_window(&mut self);

    /// Read all metrics; CPU usage covers the time since `begin_cpu_window`
    fn sample(&mut self) -> Result<ResourceSample, MonitorError>;
}

/// Counts from one monitor lifetime
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStats {
    pub samples: u64,
    pub failures: u64,
}

/// Periodic sampling loop
pub struct ResourceMonitor<S> {
    source: S,
    interval: Duration,
    cpu_window: Duration,
}

impl<S: MetricsSource + 'static> ResourceMonitor<S> {
    /// The CPU window is capped at half the interval
    pub fn new(source: S, interval: Duration, cpu_window: Duration) -> Self {
        Self {
            source,
            interval,
            cpu_window: cpu_window.min(interval / 2),
        }
    }

    /// Sample until `shutdown` is cancelled
    ///
    /// Metric reads hit the filesystem, so they run on the blocking pool.
    pub async fn run(self, shutdown: CancellationToken) -> MonitorStats {
        let Self {
            mut source,
            interval,
            cpu_window,
        } = self;
        let mut stats = MonitorStats::default();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = interval.as_secs_f64(),
            cpu_window_secs = cpu_window.as_secs_f64(),
            "Resource monitor started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            source = match with_source(source, |s| s.begin_cpu_window()).await {
                Ok((returned, ())) => returned,
                Err(e) => {
                    error!(error = %e, "Metrics task failed, stopping monitor");
                    break;
                }
            };
            if !cpu_window.is_zero() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(cpu_window) => {}
                }
            }

            let (returned, result) = match with_source(source, |s| s.sample()).await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "Metrics task failed, stopping monitor");
                    break;
                }
            };
            source = returned;

            match result {
                Ok(sample) => {
                    sample.log();
                    stats.samples += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to sample system resources");
                    stats.failures += 1;
                }
            }
        }

        info!(samples = stats.samples, failures = stats.failures, "Resource monitor stopped");
        stats
    }
}

/// Run `f` against `source` on the blocking pool and hand the source back
async fn with_source<S, T, F>(mut source: S, f: F) -> Result<(S, T), JoinError>
where
    S: Send + 'static,
    T: Send + 'static,
    F: FnOnce(&mut S) -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let out = f(&mut source);
        (source, out)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Fails every `fail_every`-th sample, otherwise reports fixed values
    struct FakeSource {
        calls: Arc<AtomicUsize>,
        fail_every: usize,
    }

    impl MetricsSource for FakeSource {
        fn begin_cpu_window(&mut self) {}

        fn sample(&mut self) -> Result<ResourceSample, MonitorError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_every != 0 && n % self.fail_every == 0 {
                return Err(MonitorError::Unavailable("memory"));
            }
            Ok(ResourceSample::new(12.5, 40.0, 70.0, None))
        }
    }

    #[test]
    fn test_sample_clamps_percentages() {
        let sample = ResourceSample::new(150.0, -3.0, f64::NAN, None);
        assert_eq!(sample.cpu_percent, 100.0);
        assert_eq!(sample.memory_percent, 0.0);
        assert_eq!(sample.disk_percent, 0.0);
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(1, 4), 25.0);
        assert_eq!(percent_of(5, 0), 0.0);
    }

    #[test]
    fn test_cpu_window_capped() {
        let source = FakeSource { calls: Arc::default(), fail_every: 0 };
        let monitor = ResourceMonitor::new(source, Duration::from_secs(2), Duration::from_secs(5));
        assert_eq!(monitor.cpu_window, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_count_matches_duration() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = FakeSource { calls: calls.clone(), fail_every: 0 };
        let monitor = ResourceMonitor::new(source, Duration::from_secs(5), Duration::from_secs(1));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(60)).await;
        shutdown.cancel();
        let stats = handle.await.unwrap();

        // ceil(60 / 5) = 12, allow one either way for the boundary tick
        assert!((11..=13).contains(&stats.samples), "got {} samples", stats.samples);
        assert_eq!(stats.failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_loop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = FakeSource { calls: calls.clone(), fail_every: 2 };
        let monitor = ResourceMonitor::new(source, Duration::from_secs(5), Duration::ZERO);

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(42)).await;
        shutdown.cancel();
        let stats = handle.await.unwrap();

        assert!(stats.failures >= 4);
        assert!(stats.samples >= 4);
        assert_eq!(stats.samples + stats.failures, calls.load(Ordering::SeqCst) as u64);
    }

    /// Records which thread each sample was taken on
    struct ThreadRecorder(Arc<std::sync::Mutex<Vec<std::thread::ThreadId>>>);

    impl MetricsSource for ThreadRecorder {
        fn begin_cpu_window(&mut self) {}

        fn sample(&mut self) -> Result<ResourceSample, MonitorError> {
            self.0.lock().unwrap().push(std::thread::current().id());
            Ok(ResourceSample::new(1.0, 1.0, 1.0, None))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_taken_off_the_runtime_thread() {
        let threads = Arc::new(std::sync::Mutex::new(Vec::new()));
        let source = ThreadRecorder(threads.clone());
        let monitor = ResourceMonitor::new(source, Duration::from_secs(5), Duration::ZERO);

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_secs(12)).await;
        shutdown.cancel();
        let stats = handle.await.unwrap();

        let runtime_thread = std::thread::current().id();
        let threads = threads.lock().unwrap();
        assert_eq!(threads.len() as u64, stats.samples);
        assert!(stats.samples >= 2);
        assert!(threads.iter().all(|id| *id != runtime_thread));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_observed_during_cpu_window() {
        let source = FakeSource { calls: Arc::default(), fail_every: 0 };
        let window = Duration::from_secs(30);
        let monitor = ResourceMonitor::new(source, Duration::from_secs(60), window);

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(monitor.run(shutdown.clone()));

        // First tick fires immediately; cancel while the CPU window is open
        tokio::time::sleep(Duration::from_secs(10)).await;
        shutdown.cancel();
        let stats = handle.await.unwrap();
        assert_eq!(stats.samples, 0);
    }
}
