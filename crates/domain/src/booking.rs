//! Booking entity, status state machine, and booking-code generation.

use chrono::{DateTime, NaiveDate, Utc};
use common::{BookingId, PatientId, ScheduleId};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::DomainError;

/// The status of a booking in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Cancelled
/// ```
/// `Confirmed` is reserved for a future confirmation flow; this core
/// never produces it, but it remains a valid stored status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Slot is reserved, awaiting the visit.
    #[default]
    Pending,

    /// Booking was confirmed by a downstream flow.
    Confirmed,

    /// Booking was cancelled (terminal state).
    Cancelled,
}

impl BookingStatus {
    /// Returns true if the booking still occupies a quota slot.
    pub fn is_active(&self) -> bool {
        !self.is_cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BookingStatus::Cancelled)
    }

    /// Returns the status name as stored in the database enum.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a stored status string.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A patient's claim on a schedule slot.
///
/// The queue number is assigned by the fast store at reservation time
/// and never changes afterwards; cancellations leave gaps rather than
/// renumbering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub patient_id: PatientId,
    pub schedule_id: ScheduleId,
    pub booking_code: String,
    pub queue_number: i32,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Returns true if this booking still occupies a quota slot.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Input for inserting a booking; status is always `pending` on creation.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub patient_id: PatientId,
    pub schedule_id: ScheduleId,
    pub booking_code: String,
    pub queue_number: i32,
}

/// Generates a booking code of the form `BK-YYYYMMDD-XXXXXX`.
///
/// The date is the schedule's date and the suffix is 24 bits of
/// OS-sourced randomness rendered as uppercase hex. Global uniqueness
/// is ultimately enforced by the database's unique constraint.
pub fn generate_booking_code(schedule_date: NaiveDate) -> String {
    let mut bytes = [0u8; 3];
    OsRng.fill_bytes(&mut bytes);
    format!(
        "BK-{}-{:02X}{:02X}{:02X}",
        schedule_date.format("%Y%m%d"),
        bytes[0],
        bytes[1],
        bytes[2]
    )
}
