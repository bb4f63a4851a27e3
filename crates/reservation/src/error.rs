use booking_store::StoreError;
use thiserror::Error;

/// Errors raised by a fast-store implementation.
#[derive(Debug, Error)]
pub enum FastStoreError {
    /// A Redis command or script failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The fast store could not be reached.
    #[error("fast store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the reservation engine.
#[derive(Debug, Error)]
pub enum ReservationError {
    /// The schedule has no remaining quota.
    #[error("schedule quota is full")]
    QuotaFull,

    /// Fast store error.
    #[error("fast store error: {0}")]
    Fast(#[from] FastStoreError),

    /// Durable store error.
    #[error("durable store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for reservation operations.
pub type Result<T> = std::result::Result<T, ReservationError>;
