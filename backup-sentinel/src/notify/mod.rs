//! Outcome notifications.
//!
//! The executor only depends on [`Notifier`]; delivery problems are reported
//! back as [`NotifyError`] and never change a run's outcome.

pub mod smtp;

pub use smtp::SmtpNotifier;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Subject and body for one run outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub subject: String,
    pub body: String,
}

impl NotificationEvent {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Invalid email address `{address}`: {reason}")]
    Address { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Message(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// Relays a run's outcome to someone outside the process
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the log only; used when no email transport is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(subject, "{}", body);
        Ok(())
    }
}
