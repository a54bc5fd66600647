//! Utility modules for the backup sentinel.

pub mod errors;
pub mod logger;

pub use errors::{Result, SentinelError};
