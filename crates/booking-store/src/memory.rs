use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use common::{BookingId, DoctorId, PatientId, ScheduleId};
use domain::{Booking, BookingStatus, CreateSchedule, NewBooking, Schedule};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{AuditEntry, BookingStore, BookingWithSchedule, QuotaSnapshot, ScheduleCounters},
};

/// In-memory durable store implementation for testing.
///
/// Mirrors the PostgreSQL implementation's observable behavior,
/// including the partial unique index on active (patient, schedule)
/// pairs, the unique booking code, and restrict-style referential
/// checks from bookings to schedules. Insert failures can be injected
/// to exercise the coordinator's compensation path.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    inner: Arc<RwLock<Inner>>,
    fail_on_insert: Arc<AtomicBool>,
    inject_on_insert: Arc<std::sync::Mutex<Option<StoreError>>>,
}

#[derive(Default)]
struct Inner {
    schedules: BTreeMap<ScheduleId, Schedule>,
    bookings: HashMap<BookingId, Booking>,
    audits: Vec<AuditEntry>,
    next_schedule_id: i32,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, the next `insert_booking` calls fail as if the store
    /// were unreachable.
    pub fn set_fail_on_insert(&self, fail: bool) {
        self.fail_on_insert.store(fail, Ordering::SeqCst);
    }

    /// Fails exactly the next `insert_booking` with the given error,
    /// e.g. a unique violation the pre-check raced past.
    pub fn inject_insert_error(&self, err: StoreError) {
        let mut slot = self
            .inject_on_insert
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(err);
    }

    /// Returns a copy of the audit records written so far.
    pub async fn audit_log(&self) -> Vec<AuditEntry> {
        self.inner.read().await.audits.clone()
    }

    /// Total number of booking rows, across all statuses.
    pub async fn booking_count(&self) -> usize {
        self.inner.read().await.bookings.len()
    }
}

fn counters_for(inner: &Inner, id: ScheduleId) -> ScheduleCounters {
    let mut booked_count = 0i64;
    let mut max_queue_number = 0i32;
    for booking in inner.bookings.values() {
        if booking.schedule_id != id {
            continue;
        }
        if booking.is_active() {
            booked_count += 1;
        }
        max_queue_number = max_queue_number.max(booking.queue_number);
    }
    ScheduleCounters {
        booked_count,
        max_queue_number,
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn find_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>> {
        Ok(self.inner.read().await.schedules.get(&id).cloned())
    }

    async fn list_schedules(&self) -> Result<Vec<Schedule>> {
        let inner = self.inner.read().await;
        let mut schedules: Vec<Schedule> = inner.schedules.values().cloned().collect();
        schedules.sort_by_key(|s| (s.schedule_date, s.start_time, s.id));
        Ok(schedules)
    }

    async fn list_schedules_by_doctor(&self, doctor_id: DoctorId) -> Result<Vec<Schedule>> {
        let inner = self.inner.read().await;
        let mut schedules: Vec<Schedule> = inner
            .schedules
            .values()
            .filter(|s| s.doctor_id == doctor_id)
            .cloned()
            .collect();
        schedules.sort_by_key(|s| (s.schedule_date, s.start_time, s.id));
        Ok(schedules)
    }

    async fn create_schedule(
        &self,
        cmd: &CreateSchedule,
        mut audit: AuditEntry,
    ) -> Result<Schedule> {
        let mut inner = self.inner.write().await;
        inner.next_schedule_id += 1;
        let now = Utc::now();
        let schedule = Schedule {
            id: ScheduleId::new(inner.next_schedule_id),
            doctor_id: cmd.doctor_id,
            schedule_date: cmd.schedule_date,
            start_time: cmd.start_time,
            end_time: cmd.end_time,
            total_quota: cmd.total_quota,
            created_at: now,
            updated_at: now,
        };
        inner.schedules.insert(schedule.id, schedule.clone());

        audit.entity_id = Some(schedule.id.to_string());
        if audit.new_value.is_none() {
            audit.new_value = serde_json::to_value(&schedule).ok();
        }
        inner.audits.push(audit);

        Ok(schedule)
    }

    async fn update_schedule(&self, schedule: &Schedule, audit: AuditEntry) -> Result<Schedule> {
        let mut inner = self.inner.write().await;
        if !inner.schedules.contains_key(&schedule.id) {
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        }
        let mut updated = schedule.clone();
        updated.updated_at = Utc::now();
        inner.schedules.insert(updated.id, updated.clone());
        inner.audits.push(audit);
        Ok(updated)
    }

    async fn delete_schedule(&self, id: ScheduleId, audit: AuditEntry) -> Result<u64> {
        let mut inner = self.inner.write().await;
        if !inner.schedules.contains_key(&id) {
            return Ok(0);
        }
        if inner.bookings.values().any(|b| b.schedule_id == id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "fk_bookings_schedule".to_string(),
            });
        }
        inner.schedules.remove(&id);
        inner.audits.push(audit);
        Ok(1)
    }

    async fn schedule_counters(&self, id: ScheduleId) -> Result<ScheduleCounters> {
        Ok(counters_for(&*self.inner.read().await, id))
    }

    async fn quota_snapshots(
        &self,
        from_date: NaiveDate,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<QuotaSnapshot>> {
        let inner = self.inner.read().await;
        let snapshots = inner
            .schedules
            .values()
            .filter(|s| s.schedule_date >= from_date)
            .skip(offset as usize)
            .take(limit as usize)
            .map(|s| {
                let counters = counters_for(&inner, s.id);
                QuotaSnapshot {
                    schedule_id: s.id,
                    total_quota: s.total_quota,
                    remaining_quota: s.total_quota - counters.booked_count as i32,
                    max_queue_number: counters.max_queue_number,
                    schedule_date: s.schedule_date,
                }
            })
            .collect();
        Ok(snapshots)
    }

    async fn insert_booking(&self, new: &NewBooking) -> Result<Booking> {
        if self.fail_on_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "injected insert failure".to_string(),
            ));
        }
        let injected = self
            .inject_on_insert
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(err) = injected {
            return Err(err);
        }

        let mut inner = self.inner.write().await;
        if !inner.schedules.contains_key(&new.schedule_id) {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "fk_bookings_schedule".to_string(),
            });
        }
        if inner
            .bookings
            .values()
            .any(|b| b.booking_code == new.booking_code)
        {
            return Err(StoreError::UniqueViolation {
                constraint: "bookings_booking_code_key".to_string(),
            });
        }
        if inner.bookings.values().any(|b| {
            b.patient_id == new.patient_id && b.schedule_id == new.schedule_id && b.is_active()
        }) {
            return Err(StoreError::UniqueViolation {
                constraint: "uq_bookings_patient_schedule_active".to_string(),
            });
        }

        let now = Utc::now();
        let booking = Booking {
            id: BookingId::new(),
            patient_id: new.patient_id,
            schedule_id: new.schedule_id,
            booking_code: new.booking_code.clone(),
            queue_number: new.queue_number,
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        inner.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>> {
        Ok(self.inner.read().await.bookings.get(&id).cloned())
    }

    async fn find_booking_with_schedule(
        &self,
        id: BookingId,
    ) -> Result<Option<BookingWithSchedule>> {
        let inner = self.inner.read().await;
        Ok(inner.bookings.get(&id).and_then(|booking| {
            inner
                .schedules
                .get(&booking.schedule_id)
                .map(|schedule| BookingWithSchedule {
                    booking: booking.clone(),
                    schedule: schedule.clone(),
                })
        }))
    }

    async fn find_active_booking(
        &self,
        patient_id: PatientId,
        schedule_id: ScheduleId,
    ) -> Result<Option<Booking>> {
        let inner = self.inner.read().await;
        Ok(inner
            .bookings
            .values()
            .find(|b| b.patient_id == patient_id && b.schedule_id == schedule_id && b.is_active())
            .cloned())
    }

    async fn list_bookings_for_patient(
        &self,
        patient_id: PatientId,
    ) -> Result<Vec<BookingWithSchedule>> {
        let inner = self.inner.read().await;
        let mut results: Vec<BookingWithSchedule> = inner
            .bookings
            .values()
            .filter(|b| b.patient_id == patient_id)
            .filter_map(|booking| {
                inner
                    .schedules
                    .get(&booking.schedule_id)
                    .map(|schedule| BookingWithSchedule {
                        booking: booking.clone(),
                        schedule: schedule.clone(),
                    })
            })
            .collect();
        results.sort_by(|a, b| b.booking.created_at.cmp(&a.booking.created_at));
        Ok(results)
    }

    async fn cancel_booking(&self, id: BookingId) -> Result<u64> {
        let mut inner = self.inner.write().await;
        match inner.bookings.get_mut(&id) {
            Some(booking) if !booking.status.is_cancelled() => {
                booking.status = BookingStatus::Cancelled;
                booking.updated_at = Utc::now();
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}
