//! The schedule administrator.

use std::sync::Arc;

use booking_store::BookingStore;
use common::{DoctorId, ScheduleId, UserId};
use domain::{CreateSchedule, Schedule, UpdateSchedule};
use reservation::{FastStore, ReservationEngine};

use crate::audit;
use crate::error::AdminError;
use crate::run_detached;

/// A schedule with its live remaining quota attached for responses.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleWithQuota {
    pub schedule: Schedule,
    pub remaining_quota: i64,
}

/// Administrative write path for schedules.
///
/// Every mutation commits to the durable store together with its audit
/// record, then reconciles the fast store synchronously on a detached
/// deadline. A fast-store failure here is logged and tolerated: the
/// durable store is the source of truth and the next sync converges it.
/// Bookings racing a stale fast store simply see the old quota.
pub struct ScheduleAdmin<S, F>
where
    S: BookingStore,
    F: FastStore,
{
    store: S,
    engine: Arc<ReservationEngine<F, S>>,
}

impl<S, F> ScheduleAdmin<S, F>
where
    S: BookingStore + 'static,
    F: FastStore + 'static,
{
    pub fn new(store: S, engine: Arc<ReservationEngine<F, S>>) -> Self {
        Self { store, engine }
    }

    #[tracing::instrument(skip(self, cmd))]
    pub async fn create_schedule(
        &self,
        actor: Option<UserId>,
        cmd: CreateSchedule,
    ) -> Result<Schedule, AdminError> {
        cmd.validate()?;

        let schedule = self
            .store
            .create_schedule(&cmd, audit::schedule_created(actor))
            .await
            .map_err(AdminError::from_schedule_write)?;

        let engine = self.engine.clone();
        let (id, quota, date) = (schedule.id, schedule.total_quota, schedule.schedule_date);
        run_detached("sync after schedule create", async move {
            engine.sync_schedule(id, quota, date).await
        })
        .await;

        tracing::info!(schedule_id = %schedule.id, "schedule created");
        Ok(schedule)
    }

    /// Applies a partial update, then reconciles the fast store:
    /// a date change invalidates both keys (their TTL was derived from
    /// the old date), while a capacity change is applied as a delta so
    /// concurrent reservations are never erased by an absolute write.
    #[tracing::instrument(skip(self, cmd))]
    pub async fn update_schedule(
        &self,
        actor: Option<UserId>,
        id: ScheduleId,
        cmd: UpdateSchedule,
    ) -> Result<Schedule, AdminError> {
        let mut schedule = self
            .store
            .find_schedule(id)
            .await?
            .ok_or(AdminError::ScheduleNotFound)?;
        let old_value = serde_json::to_value(&schedule).ok();

        let changes = cmd.apply_to(&mut schedule)?;

        let entry = audit::schedule_updated(
            actor,
            id.to_string(),
            old_value,
            serde_json::to_value(&schedule).ok(),
        );
        let updated = self
            .store
            .update_schedule(&schedule, entry)
            .await
            .map_err(AdminError::from_schedule_write)?;

        if changes.date_changed {
            let engine = self.engine.clone();
            let (quota, date) = (updated.total_quota, updated.schedule_date);
            run_detached("re-sync after schedule date change", async move {
                engine.delete_schedule_keys(id).await?;
                engine.sync_schedule(id, quota, date).await
            })
            .await;
        } else if let Some(delta) = changes.quota_delta {
            let engine = self.engine.clone();
            let date = updated.schedule_date;
            run_detached("quota delta after schedule update", async move {
                engine.update_quota_delta(id, delta, date).await
            })
            .await;
        }

        tracing::info!(
            schedule_id = %id,
            quota_delta = changes.quota_delta,
            date_changed = changes.date_changed,
            "schedule updated"
        );
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_schedule(
        &self,
        actor: Option<UserId>,
        id: ScheduleId,
    ) -> Result<(), AdminError> {
        let schedule = self
            .store
            .find_schedule(id)
            .await?
            .ok_or(AdminError::ScheduleNotFound)?;

        let entry =
            audit::schedule_deleted(actor, id.to_string(), serde_json::to_value(&schedule).ok());
        let affected = self.store.delete_schedule(id, entry).await?;
        if affected == 0 {
            return Err(AdminError::ScheduleNotFound);
        }

        let engine = self.engine.clone();
        run_detached("delete keys after schedule delete", async move {
            engine.delete_schedule_keys(id).await
        })
        .await;

        tracing::info!(schedule_id = %id, "schedule deleted");
        Ok(())
    }

    /// Loads one schedule with its remaining quota, read live from the
    /// fast store and recomputed from durable counters when the key is
    /// missing or the fast store is down.
    pub async fn get_schedule(&self, id: ScheduleId) -> Result<ScheduleWithQuota, AdminError> {
        let schedule = self
            .store
            .find_schedule(id)
            .await?
            .ok_or(AdminError::ScheduleNotFound)?;

        let remaining_quota = match self.engine.remaining_quota(id).await {
            Ok(Some(remaining)) => remaining,
            Ok(None) => self.remaining_from_store(&schedule).await?,
            Err(err) => {
                tracing::warn!(error = %err, schedule_id = %id, "fast store read failed, using durable counters");
                self.remaining_from_store(&schedule).await?
            }
        };

        Ok(ScheduleWithQuota {
            schedule,
            remaining_quota,
        })
    }

    /// All schedules with remaining quota computed from durable
    /// counters, as administrative listings use.
    pub async fn list_schedules(&self) -> Result<Vec<ScheduleWithQuota>, AdminError> {
        let schedules = self.store.list_schedules().await?;
        self.attach_quota(schedules).await
    }

    pub async fn list_schedules_by_doctor(
        &self,
        doctor_id: DoctorId,
    ) -> Result<Vec<ScheduleWithQuota>, AdminError> {
        let schedules = self.store.list_schedules_by_doctor(doctor_id).await?;
        self.attach_quota(schedules).await
    }

    async fn attach_quota(
        &self,
        schedules: Vec<Schedule>,
    ) -> Result<Vec<ScheduleWithQuota>, AdminError> {
        let mut out = Vec::with_capacity(schedules.len());
        for schedule in schedules {
            let remaining_quota = self.remaining_from_store(&schedule).await?;
            out.push(ScheduleWithQuota {
                schedule,
                remaining_quota,
            });
        }
        Ok(out)
    }

    async fn remaining_from_store(&self, schedule: &Schedule) -> Result<i64, AdminError> {
        let counters = self.store.schedule_counters(schedule.id).await?;
        Ok((i64::from(schedule.total_quota) - counters.booked_count).max(0))
    }
}
