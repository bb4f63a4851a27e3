//! Schedule entity and administrative commands.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use common::{DoctorId, ScheduleId};
use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Returns today's date in UTC, truncated to the day.
///
/// All "is this schedule in the past" decisions use this single
/// definition so the booking and sync paths agree.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// A doctor's bookable time window on a given date.
///
/// The remaining quota is intentionally not a field here: it is read
/// live from the fast store (or computed from bookings for
/// administrative listings) to avoid carrying stale counts between
/// layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub doctor_id: DoctorId,
    pub schedule_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub total_quota: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// Returns true if the schedule's date is strictly before `today`.
    pub fn is_past(&self, today: NaiveDate) -> bool {
        self.schedule_date < today
    }
}

fn validate_window(start: NaiveTime, end: NaiveTime) -> Result<(), DomainError> {
    if end <= start {
        return Err(DomainError::EndNotAfterStart { start, end });
    }
    Ok(())
}

fn validate_quota(quota: i32) -> Result<(), DomainError> {
    if quota <= 0 {
        return Err(DomainError::NonPositiveQuota { quota });
    }
    Ok(())
}

/// Command to create a new schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSchedule {
    pub doctor_id: DoctorId,
    pub schedule_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub total_quota: i32,
}

impl CreateSchedule {
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_window(self.start_time, self.end_time)?;
        validate_quota(self.total_quota)
    }
}

/// Command to update a schedule; unset fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSchedule {
    pub doctor_id: Option<DoctorId>,
    pub schedule_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub total_quota: Option<i32>,
}

/// What an update changed, as the fast-store reconciliation needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleChanges {
    /// `new_total - old_total` when the quota changed.
    pub quota_delta: Option<i32>,
    /// The schedule moved to a different date, invalidating key TTLs.
    pub date_changed: bool,
}

impl UpdateSchedule {
    /// Applies the update to `schedule` in place, validating the merged
    /// result, and reports what changed.
    pub fn apply_to(&self, schedule: &mut Schedule) -> Result<ScheduleChanges, DomainError> {
        let old_quota = schedule.total_quota;
        let old_date = schedule.schedule_date;

        if let Some(doctor_id) = self.doctor_id {
            schedule.doctor_id = doctor_id;
        }
        if let Some(date) = self.schedule_date {
            schedule.schedule_date = date;
        }
        if let Some(start) = self.start_time {
            schedule.start_time = start;
        }
        if let Some(end) = self.end_time {
            schedule.end_time = end;
        }
        if let Some(quota) = self.total_quota {
            validate_quota(quota)?;
            schedule.total_quota = quota;
        }
        validate_window(schedule.start_time, schedule.end_time)?;

        let quota_delta = (schedule.total_quota != old_quota)
            .then_some(schedule.total_quota - old_quota);

        Ok(ScheduleChanges {
            quota_delta,
            date_changed: schedule.schedule_date != old_date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> Schedule {
        Schedule {
            id: ScheduleId::new(1),
            doctor_id: DoctorId::new(),
            schedule_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            total_quota: 10,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn create_rejects_inverted_window() {
        let cmd = CreateSchedule {
            doctor_id: DoctorId::new(),
            schedule_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            total_quota: 5,
        };
        assert!(matches!(
            cmd.validate(),
            Err(DomainError::EndNotAfterStart { .. })
        ));
    }

    #[test]
    fn create_rejects_zero_quota() {
        let cmd = CreateSchedule {
            doctor_id: DoctorId::new(),
            schedule_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            total_quota: 0,
        };
        assert!(matches!(
            cmd.validate(),
            Err(DomainError::NonPositiveQuota { quota: 0 })
        ));
    }

    #[test]
    fn update_reports_quota_delta() {
        let mut s = schedule();
        let changes = UpdateSchedule {
            total_quota: Some(6),
            ..Default::default()
        }
        .apply_to(&mut s)
        .unwrap();

        assert_eq!(changes.quota_delta, Some(-4));
        assert!(!changes.date_changed);
        assert_eq!(s.total_quota, 6);
    }

    #[test]
    fn update_reports_date_change() {
        let mut s = schedule();
        let changes = UpdateSchedule {
            schedule_date: NaiveDate::from_ymd_opt(2025, 6, 2),
            ..Default::default()
        }
        .apply_to(&mut s)
        .unwrap();

        assert!(changes.date_changed);
        assert_eq!(changes.quota_delta, None);
    }

    #[test]
    fn update_noop_reports_nothing() {
        let mut s = schedule();
        let changes = UpdateSchedule {
            total_quota: Some(10),
            ..Default::default()
        }
        .apply_to(&mut s)
        .unwrap();

        assert_eq!(changes.quota_delta, None);
        assert!(!changes.date_changed);
    }

    #[test]
    fn update_validates_merged_window() {
        let mut s = schedule();
        let result = UpdateSchedule {
            end_time: NaiveTime::from_hms_opt(8, 0, 0),
            ..Default::default()
        }
        .apply_to(&mut s);

        assert!(matches!(result, Err(DomainError::EndNotAfterStart { .. })));
    }

    #[test]
    fn is_past_compares_dates_only() {
        let s = schedule();
        assert!(s.is_past(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()));
        assert!(!s.is_past(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()));
        assert!(!s.is_past(NaiveDate::from_ymd_opt(2025, 5, 31).unwrap()));
    }
}
