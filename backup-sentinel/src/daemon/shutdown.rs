//! Graceful shutdown handling for SIGTERM and SIGINT.
//!
//! Ensures that:
//! - The monitor and scheduler loops stop within one interval
//! - Running backups finish their current entry and send their notification
//! - The wait for in-flight runs is bounded

use crate::executor::BackupRunner;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Shutdown coordinator
#[derive(Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token observed by every long-running component
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request shutdown without waiting for a signal
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait for shutdown signal (SIGTERM or SIGINT), or an earlier `trigger`
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown...");
            }
            _ = self.token.cancelled() => {
                info!("Shutdown requested");
            }
        }

        self.token.cancel();
    }

    /// Wait for in-flight backup runs, giving up after `timeout`
    pub async fn shutdown(&self, runner: &BackupRunner, timeout: Duration) {
        info!(in_flight = runner.in_flight(), "Graceful shutdown initiated");

        match tokio::time::timeout(timeout, runner.drain()).await {
            Ok(()) => info!("Graceful shutdown complete"),
            Err(_) => warn!(
                in_flight = runner.in_flight(),
                "Backup runs still active after {}s, exiting anyway",
                timeout.as_secs()
            ),
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
