//! Configuration management for the backup sentinel.
//!
//! Loaded once at startup from a TOML file. The `Email` and `Backup`
//! sections are required; everything else falls back to defaults.

use crate::scheduler::Cadence;
use crate::utils::errors::{Result, SentinelError};
use chrono::{NaiveTime, Weekday};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up next to the executable when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct Config {
    pub email: EmailConfig,
    pub backup: BackupConfig,
    pub monitor: MonitorConfig,
    pub scheduler: SchedulerConfig,
    pub log: LogConfig,
}

/// On-disk shape; sections stay optional so missing ones can be reported together.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "Email")]
    email: Option<EmailConfig>,
    #[serde(rename = "Backup")]
    backup: Option<BackupConfig>,
    #[serde(rename = "Monitor", default)]
    monitor: MonitorConfig,
    #[serde(rename = "Scheduler", default)]
    scheduler: SchedulerConfig,
    #[serde(rename = "Log", default)]
    log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Sender address, also the SMTP login
    #[serde(default)]
    pub sender: String,

    /// Recipient address
    #[serde(default)]
    pub receiver: String,

    #[serde(default)]
    pub password: String,

    /// SMTP relay host
    #[serde(default = "default_smtp_server")]
    pub smtp_server: String,

    /// SMTP port (STARTTLS)
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackupConfig {
    /// Directory whose top-level entries are backed up
    #[serde(default)]
    pub source_dir: String,

    /// Parent of the timestamped backup folders
    #[serde(default)]
    pub backup_dir: String,

    /// `daily` or `weekly`
    #[serde(default = "default_backup_schedule")]
    pub backup_schedule: String,

    /// Time of day the trigger fires (HH:MM, local time)
    #[serde(default = "default_backup_time")]
    pub backup_time: String,

    /// Weekday used by the `weekly` schedule
    #[serde(default = "default_backup_day")]
    pub backup_day: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,

    /// CPU usage is averaged over this window
    #[serde(default = "default_cpu_window_secs")]
    pub cpu_window_secs: u64,

    /// Any path on the disk to report usage for
    #[serde(default = "default_disk_mount")]
    pub disk_mount: PathBuf,

    #[serde(default = "default_true")]
    pub network: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Append-only log file; relative paths resolve next to the executable
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

// Default values
fn default_smtp_server() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_backup_schedule() -> String {
    "daily".to_string()
}

fn default_backup_time() -> String {
    "02:00".to_string()
}

fn default_backup_day() -> String {
    "monday".to_string()
}

fn default_sample_interval_secs() -> u64 {
    5
}

fn default_cpu_window_secs() -> u64 {
    1
}

fn default_disk_mount() -> PathBuf {
    PathBuf::from("/")
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from("system_manager.log")
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: default_sample_interval_secs(),
            cpu_window_secs: default_cpu_window_secs(),
            disk_mount: default_disk_mount(),
            network: default_true(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SentinelError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)?;

        let mut missing = Vec::new();
        if raw.email.is_none() {
            missing.push("Email");
        }
        if raw.backup.is_none() {
            missing.push("Backup");
        }
        let (Some(email), Some(backup)) = (raw.email, raw.backup) else {
            return Err(SentinelError::MissingSections(missing.join(", ")));
        };

        let config = Config {
            email,
            backup,
            monitor: raw.monitor,
            scheduler: raw.scheduler,
            log: raw.log,
        };
        config.validate()?;
        Ok(config)
    }

    /// Default config location: next to the running executable
    pub fn default_path() -> PathBuf {
        executable_dir().join(DEFAULT_CONFIG_FILE)
    }

    /// Log file path with relative paths anchored at the executable's directory
    pub fn log_file_path(&self) -> PathBuf {
        if self.log.file.is_absolute() {
            self.log.file.clone()
        } else {
            executable_dir().join(&self.log.file)
        }
    }

    /// Trigger cadence described by the `Backup` section
    pub fn cadence(&self) -> Result<Cadence> {
        let time = parse_time_of_day(&self.backup.backup_time)?;
        match self.backup.backup_schedule.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Cadence::Daily(time)),
            "weekly" => Ok(Cadence::Weekly(parse_weekday(&self.backup.backup_day)?, time)),
            other => Err(SentinelError::Config(format!(
                "Backup.backup_schedule must be `daily` or `weekly`, got `{other}`"
            ))),
        }
    }

    /// Both backup directories are set
    pub fn backup_configured(&self) -> bool {
        !self.backup.source_dir.trim().is_empty() && !self.backup.backup_dir.trim().is_empty()
    }

    /// Both email endpoints are set
    pub fn email_configured(&self) -> bool {
        !self.email.sender.trim().is_empty() && !self.email.receiver.trim().is_empty()
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.sample_interval_secs)
    }

    pub fn cpu_window(&self) -> Duration {
        Duration::from_secs(self.monitor.cpu_window_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.poll_interval_secs)
    }

    fn validate(&self) -> Result<()> {
        self.cadence()?;
        if self.monitor.sample_interval_secs == 0 {
            return Err(SentinelError::Config(
                "Monitor.sample_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.scheduler.poll_interval_secs == 0 {
            return Err(SentinelError::Config(
                "Scheduler.poll_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| {
            SentinelError::Config(format!("Backup.backup_time must be HH:MM, got `{value}`"))
        })
}

fn parse_weekday(value: &str) -> Result<Weekday> {
    value
        .trim()
        .parse::<Weekday>()
        .map_err(|_| {
            SentinelError::Config(format!("Backup.backup_day is not a weekday: `{value}`"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[Email]
sender = "ops@example.com"
receiver = "admin@example.com"
password = "secret"

[Backup]
source_dir = "/data"
backup_dir = "/mnt/backups"
backup_schedule = "weekly"
backup_day = "friday"
backup_time = "23:30"
"#;

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_toml_str("[Email]\n[Backup]\n").unwrap();
        assert_eq!(config.email.smtp_server, "smtp.gmail.com");
        assert_eq!(config.email.smtp_port, 587);
        assert_eq!(config.backup.backup_schedule, "daily");
        assert_eq!(config.monitor.sample_interval_secs, 5);
        assert_eq!(config.scheduler.poll_interval_secs, 1);
        assert_eq!(config.log.level, "info");
        assert!(!config.backup_configured());
        assert!(!config.email_configured());
    }

    #[test]
    fn test_daily_cadence_at_two() {
        let config = Config::from_toml_str("[Email]\n[Backup]\n").unwrap();
        let expected = NaiveTime::from_hms_opt(2, 0, 0).unwrap();
        assert_eq!(config.cadence().unwrap(), Cadence::Daily(expected));
    }

    #[test]
    fn test_weekly_cadence() {
        let config = Config::from_toml_str(FULL).unwrap();
        let expected = NaiveTime::from_hms_opt(23, 30, 0).unwrap();
        assert_eq!(config.cadence().unwrap(), Cadence::Weekly(Weekday::Fri, expected));
        assert!(config.backup_configured());
        assert!(config.email_configured());
    }

    #[test]
    fn test_missing_sections_rejected() {
        let err = Config::from_toml_str("[Email]\nsender = \"a@b.c\"\n").unwrap_err();
        assert!(matches!(err, SentinelError::MissingSections(ref s) if s == "Backup"));

        let err = Config::from_toml_str("").unwrap_err();
        assert!(matches!(err, SentinelError::MissingSections(ref s) if s == "Email, Backup"));
    }

    #[test]
    fn test_unknown_schedule_rejected() {
        let err = Config::from_toml_str("[Email]\n[Backup]\nbackup_schedule = \"hourly\"\n")
            .unwrap_err();
        assert!(matches!(err, SentinelError::Config(_)));
    }

    #[test]
    fn test_bad_time_rejected() {
        let err = Config::from_toml_str("[Email]\n[Backup]\nbackup_time = \"25:00\"\n")
            .unwrap_err();
        assert!(matches!(err, SentinelError::Config(_)));
    }

    #[test]
    fn test_unreadable_file() {
        let err = Config::from_file(Path::new("/nonexistent/backup-sentinel/config.toml"))
            .unwrap_err();
        assert!(matches!(err, SentinelError::ConfigRead { .. }));
    }

    #[test]
    fn test_from_file() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("config.toml");
        std::fs::write(&path, FULL)?;
        let config = Config::from_file(&path)?;
        assert_eq!(config.backup.source_dir, "/data");
        assert_eq!(config.email.password, "secret");
        Ok(())
    }
}
