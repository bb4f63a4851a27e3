//! Shared identifier types for the appointment-booking system.

pub mod types;

pub use types::{BookingId, DoctorId, PatientId, ScheduleId, UserId};
