//! Service error types.

use booking_store::StoreError;
use domain::DomainError;
use reservation::ReservationError;
use thiserror::Error;

/// Errors raised by the booking coordinator.
#[derive(Debug, Error)]
pub enum BookingError {
    /// The schedule does not exist.
    #[error("schedule not found")]
    ScheduleNotFound,

    /// The schedule's date is already in the past.
    #[error("cannot book a past schedule")]
    SchedulePast,

    /// The patient already holds an active booking on this schedule.
    #[error("you have already booked this schedule")]
    AlreadyBooked,

    /// The schedule has no remaining quota.
    #[error("schedule quota is full")]
    QuotaFull,

    /// The booking does not exist.
    #[error("booking not found")]
    BookingNotFound,

    /// The booking belongs to another patient.
    #[error("booking does not belong to you")]
    BookingNotOwned,

    /// The booking was already cancelled.
    #[error("booking is already cancelled")]
    AlreadyCancelled,

    /// Durable store error.
    #[error("durable store error: {0}")]
    Store(#[from] StoreError),

    /// Fast-store or engine error on the reservation path.
    #[error("reservation error: {0}")]
    Reservation(ReservationError),
}

impl From<ReservationError> for BookingError {
    fn from(err: ReservationError) -> Self {
        match err {
            ReservationError::QuotaFull => BookingError::QuotaFull,
            other => BookingError::Reservation(other),
        }
    }
}

/// Errors raised by the schedule administrator.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The schedule does not exist.
    #[error("schedule not found")]
    ScheduleNotFound,

    /// The referenced doctor does not exist.
    #[error("doctor not found")]
    DoctorNotFound,

    /// The command failed domain validation.
    #[error("invalid schedule: {0}")]
    Validation(#[from] DomainError),

    /// Durable store error.
    #[error("durable store error: {0}")]
    Store(#[from] StoreError),
}

impl AdminError {
    /// Maps a store error, translating a doctor foreign-key violation
    /// into the domain-shaped `DoctorNotFound`.
    pub(crate) fn from_schedule_write(err: StoreError) -> Self {
        if err.is_foreign_key_violation("doctor") {
            AdminError::DoctorNotFound
        } else {
            AdminError::Store(err)
        }
    }
}
