//! Backup Sentinel - Main entry point
//!
//! Runs the resource monitor and the backup scheduler side by side until
//! SIGINT or SIGTERM.

use anyhow::{Context, Result};
use backup_sentinel::{
    config::Config,
    daemon::{shutdown::ShutdownCoordinator, trigger},
    executor::{BackupJob, BackupRunner, SnapshotCopier},
    monitor::{HostMetrics, ResourceMonitor},
    notify::{LogNotifier, Notifier, SmtpNotifier},
    scheduler::Scheduler,
    utils,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How long in-flight backups get to finish after a shutdown signal
const DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Id of the job built from the `Backup` section
const CONFIGURED_JOB_ID: &str = "configured";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: config.toml next to the executable)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration; any problem here stops the process before it starts
    let config_path = args.config.unwrap_or_else(Config::default_path);
    let config = Config::from_file(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    let _log_guard = utils::logger::init(log_level, &config.log_file_path())?;

    tracing::info!(
        "Starting backup-sentinel v{} (config: {})",
        env!("CARGO_PKG_VERSION"),
        config_path.display()
    );

    let shutdown_coordinator = ShutdownCoordinator::new();

    let notifier: Arc<dyn Notifier> = if config.email_configured() {
        match SmtpNotifier::new(&config.email) {
            Ok(smtp) => Arc::new(smtp),
            Err(e) => {
                tracing::error!("Email notifications disabled: {}", e);
                Arc::new(LogNotifier)
            }
        }
    } else {
        tracing::warn!(
            "Email sender or receiver not configured; notifications will only be logged"
        );
        Arc::new(LogNotifier)
    };

    let runner = BackupRunner::new(SnapshotCopier::new(shutdown_coordinator.token()), notifier);

    // Resource monitor
    let monitor = ResourceMonitor::new(
        HostMetrics::new(config.monitor.disk_mount.clone(), config.monitor.network),
        config.sample_interval(),
        config.cpu_window(),
    );
    let monitor_handle = tokio::spawn(monitor.run(shutdown_coordinator.token()));

    // Scheduler and manual trigger
    let mut scheduler = Scheduler::new(runner.clone(), config.poll_interval());
    let mut trigger_handle = None;
    if config.backup_configured() {
        let job = BackupJob::new(
            CONFIGURED_JOB_ID,
            config.backup.source_dir.trim(),
            config.backup.backup_dir.trim(),
        );
        scheduler.add_rule(config.cadence()?, job.clone());
        trigger_handle = Some(tokio::spawn(trigger::listen_for_manual_trigger(
            runner.clone(),
            job,
            shutdown_coordinator.token(),
        )));
    } else {
        tracing::warn!(
            "Backup directories are not properly configured; no backups will be scheduled"
        );
    }
    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_coordinator.token()));

    // Wait for shutdown signal
    shutdown_coordinator.wait_for_signal().await;

    // Loops observe the token within one interval
    if let Err(e) = scheduler_handle.await {
        tracing::error!("Scheduler task panicked: {}", e);
    }
    if let Some(handle) = trigger_handle {
        let _ = handle.await;
    }
    match monitor_handle.await {
        Ok(stats) => tracing::debug!(
            samples = stats.samples,
            failures = stats.failures,
            "Monitor finished"
        ),
        Err(e) => tracing::error!("Monitor task panicked: {}", e),
    }

    // Let in-flight backups finish their current entry and notify
    shutdown_coordinator.shutdown(&runner, DRAIN_TIMEOUT).await;

    Ok(())
}
