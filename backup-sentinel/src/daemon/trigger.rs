//! Manual backup trigger: SIGUSR1 runs the configured job immediately.

use crate::executor::{BackupJob, BackupRunner};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Listen for SIGUSR1 and dispatch `job` on each one until shutdown
#[cfg(unix)]
pub async fn listen_for_manual_trigger(
    runner: BackupRunner,
    job: BackupJob,
    shutdown: CancellationToken,
) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = match signal(SignalKind::user_defined1()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to install SIGUSR1 handler, manual trigger disabled: {}", e);
            return;
        }
    };

    info!(job_id = %job.id, "Send SIGUSR1 to start a backup now");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = usr1.recv() => {
                if received.is_none() {
                    break;
                }
                info!(job_id = %job.id, "Received SIGUSR1, starting manual backup");
                // Shares the scheduled job's busy flag
                let _ = runner.dispatch(job.clone());
            }
        }
    }
}

#[cfg(not(unix))]
pub async fn listen_for_manual_trigger(
    _runner: BackupRunner,
    job: BackupJob,
    shutdown: CancellationToken,
) {
    info!(job_id = %job.id, "Manual trigger signal not supported on this platform");
    shutdown.cancelled().await;
}
