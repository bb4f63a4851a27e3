//! Domain error types.

use chrono::NaiveTime;
use thiserror::Error;

/// Errors raised when validating domain commands and values.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A schedule's end time does not come after its start time.
    #[error("end time {end} must be after start time {start}")]
    EndNotAfterStart { start: NaiveTime, end: NaiveTime },

    /// A schedule's total quota must be a positive integer.
    #[error("total quota must be positive, got {quota}")]
    NonPositiveQuota { quota: i32 },

    /// A booking status string did not match any known status.
    #[error("unknown booking status: {0}")]
    UnknownStatus(String),
}
