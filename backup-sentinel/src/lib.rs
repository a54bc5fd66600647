//! Backup Sentinel Library
//!
//! Scheduled timestamped directory backups, a background host resource
//! monitor, and outcome notifications by email.

pub mod config;
pub mod daemon;
pub mod executor;
pub mod fs;
pub mod monitor;
pub mod notify;
pub mod scheduler;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use executor::{BackupJob, BackupRun, BackupRunner, RunOutcome, SnapshotCopier};
pub use utils::errors::SentinelError;
pub type Result<T> = std::result::Result<T, SentinelError>;
