use async_trait::async_trait;
use chrono::NaiveDate;
use common::{BookingId, DoctorId, PatientId, ScheduleId, UserId};
use domain::{Booking, CreateSchedule, NewBooking, Schedule};

use crate::Result;

/// An audit record written in the same transaction as the schedule
/// mutation it describes.
///
/// For `create_schedule` the store fills `entity_id` and `new_value`
/// from the inserted row, since the serial id is not known up front.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: Option<UserId>,
    pub action: String,
    pub entity: &'static str,
    pub entity_id: Option<String>,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
}

impl AuditEntry {
    /// Renders the metadata document persisted alongside the action.
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "entity": self.entity,
            "entity_id": self.entity_id,
            "old_value": self.old_value,
            "new_value": self.new_value,
        })
    }
}

/// Per-schedule booking counters used to compute fast-store truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleCounters {
    /// Bookings with status other than cancelled.
    pub booked_count: i64,
    /// Highest queue number ever assigned, across all statuses.
    pub max_queue_number: i32,
}

/// One schedule's row in the startup-sync batch query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub schedule_id: ScheduleId,
    pub total_quota: i32,
    pub remaining_quota: i32,
    pub max_queue_number: i32,
    pub schedule_date: NaiveDate,
}

/// A booking joined with its schedule, for API responses.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingWithSchedule {
    pub booking: Booking,
    pub schedule: Schedule,
}

/// Durable store interface for schedules, bookings, and audit records.
///
/// The store is the source of truth; the reservation engine derives the
/// fast-store state from it. Administrative writes compose the entity
/// mutation and its audit record in one transaction inside the
/// implementation, so callers never observe one without the other.
#[async_trait]
pub trait BookingStore: Send + Sync {
    // -- Schedules --

    async fn find_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>>;

    async fn list_schedules(&self) -> Result<Vec<Schedule>>;

    async fn list_schedules_by_doctor(&self, doctor_id: DoctorId) -> Result<Vec<Schedule>>;

    /// Inserts a schedule and its audit record in one transaction.
    async fn create_schedule(&self, cmd: &CreateSchedule, audit: AuditEntry) -> Result<Schedule>;

    /// Overwrites a schedule's mutable fields and writes the audit
    /// record in one transaction.
    async fn update_schedule(&self, schedule: &Schedule, audit: AuditEntry) -> Result<Schedule>;

    /// Deletes a schedule, returning the number of rows removed. The
    /// audit record is written only when a row was actually deleted.
    async fn delete_schedule(&self, id: ScheduleId, audit: AuditEntry) -> Result<u64>;

    // -- Booking counters --

    /// Counts active bookings and the highest queue number for one
    /// schedule, in a single query.
    async fn schedule_counters(&self, id: ScheduleId) -> Result<ScheduleCounters>;

    /// Pages through schedules dated `from_date` or later, joined with
    /// their booking counters. Ordered by schedule id so offset paging
    /// is stable.
    async fn quota_snapshots(
        &self,
        from_date: NaiveDate,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<QuotaSnapshot>>;

    // -- Bookings --

    /// Inserts a pending booking. Unique and referential violations are
    /// reported as typed `StoreError` variants carrying the constraint
    /// name.
    async fn insert_booking(&self, new: &NewBooking) -> Result<Booking>;

    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>>;

    async fn find_booking_with_schedule(&self, id: BookingId)
    -> Result<Option<BookingWithSchedule>>;

    /// Finds the patient's non-cancelled booking on a schedule, if any.
    async fn find_active_booking(
        &self,
        patient_id: PatientId,
        schedule_id: ScheduleId,
    ) -> Result<Option<Booking>>;

    /// The patient's bookings with their schedules, newest first.
    async fn list_bookings_for_patient(
        &self,
        patient_id: PatientId,
    ) -> Result<Vec<BookingWithSchedule>>;

    /// Atomically cancels a booking unless it is already cancelled.
    /// Returns the number of rows affected: 1 on success, 0 when the
    /// booking was already cancelled. The caller must not restore quota
    /// when 0 is returned.
    async fn cancel_booking(&self, id: BookingId) -> Result<u64>;
}
