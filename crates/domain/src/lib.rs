//! Domain layer for the appointment-booking system.
//!
//! This crate provides the core domain types:
//! - `Schedule`: a doctor's bookable time window with a total quota
//! - `Booking`: a patient's claim on a schedule slot, with its status
//!   state machine and human-readable booking code
//! - Validated commands for administrative schedule changes

pub mod booking;
pub mod error;
pub mod schedule;

pub use booking::{Booking, BookingStatus, NewBooking, generate_booking_code};
pub use error::DomainError;
pub use schedule::{CreateSchedule, Schedule, ScheduleChanges, UpdateSchedule, today_utc};
