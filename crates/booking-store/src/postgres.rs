use async_trait::async_trait;
use chrono::NaiveDate;
use common::{BookingId, DoctorId, PatientId, ScheduleId};
use domain::{Booking, BookingStatus, CreateSchedule, NewBooking, Schedule};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{AuditEntry, BookingStore, BookingWithSchedule, QuotaSnapshot, ScheduleCounters},
};

/// PostgreSQL-backed durable store.
#[derive(Clone)]
pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_schedule(row: &PgRow) -> Result<Schedule> {
        Ok(Schedule {
            id: ScheduleId::new(row.try_get("id")?),
            doctor_id: DoctorId::from_uuid(row.try_get::<Uuid, _>("doctor_id")?),
            schedule_date: row.try_get("schedule_date")?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            total_quota: row.try_get("total_quota")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_booking(row: &PgRow) -> Result<Booking> {
        let status: String = row.try_get("status")?;
        Ok(Booking {
            id: BookingId::from_uuid(row.try_get::<Uuid, _>("id")?),
            patient_id: PatientId::from_uuid(row.try_get::<Uuid, _>("patient_id")?),
            schedule_id: ScheduleId::new(row.try_get("schedule_id")?),
            booking_code: row.try_get("booking_code")?,
            queue_number: row.try_get("queue_number")?,
            status: BookingStatus::parse(&status)
                .map_err(|e| StoreError::InvalidData(e.to_string()))?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_booking_with_schedule(row: &PgRow) -> Result<BookingWithSchedule> {
        let booking = Self::row_to_booking(row)?;
        let schedule = Schedule {
            id: ScheduleId::new(row.try_get("s_id")?),
            doctor_id: DoctorId::from_uuid(row.try_get::<Uuid, _>("s_doctor_id")?),
            schedule_date: row.try_get("s_schedule_date")?,
            start_time: row.try_get("s_start_time")?,
            end_time: row.try_get("s_end_time")?,
            total_quota: row.try_get("s_total_quota")?,
            created_at: row.try_get("s_created_at")?,
            updated_at: row.try_get("s_updated_at")?,
        };
        Ok(BookingWithSchedule { booking, schedule })
    }

    async fn insert_audit(tx: &mut Transaction<'_, Postgres>, audit: &AuditEntry) -> Result<()> {
        sqlx::query("INSERT INTO audit_logs (user_id, action, metadata) VALUES ($1, $2, $3)")
            .bind(audit.user_id.map(|id| id.as_uuid()))
            .bind(&audit.action)
            .bind(audit.metadata())
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

/// Maps constraint violations onto typed variants so callers can match
/// on the constraint name without parsing driver errors.
fn map_db_err(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e {
        let constraint = db_err.constraint().unwrap_or_default().to_string();
        match db_err.code().as_deref() {
            Some("23505") => return StoreError::UniqueViolation { constraint },
            Some("23503") => return StoreError::ForeignKeyViolation { constraint },
            _ => {}
        }
    }
    StoreError::Database(e)
}

const BOOKING_WITH_SCHEDULE_SELECT: &str = r#"
    SELECT b.id, b.patient_id, b.schedule_id, b.booking_code, b.queue_number,
           b.status::text AS status, b.created_at, b.updated_at,
           s.id AS s_id, s.doctor_id AS s_doctor_id, s.schedule_date AS s_schedule_date,
           s.start_time AS s_start_time, s.end_time AS s_end_time,
           s.total_quota AS s_total_quota, s.created_at AS s_created_at,
           s.updated_at AS s_updated_at
    FROM bookings b
    JOIN doctor_schedules s ON s.id = b.schedule_id
"#;

#[async_trait]
impl BookingStore for PostgresBookingStore {
    async fn find_schedule(&self, id: ScheduleId) -> Result<Option<Schedule>> {
        let row = sqlx::query(
            r#"
            SELECT id, doctor_id, schedule_date, start_time, end_time,
                   total_quota, created_at, updated_at
            FROM doctor_schedules
            WHERE id = $1
            "#,
        )
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_schedule).transpose()
    }

    async fn list_schedules(&self) -> Result<Vec<Schedule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, doctor_id, schedule_date, start_time, end_time,
                   total_quota, created_at, updated_at
            FROM doctor_schedules
            ORDER BY schedule_date, start_time, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_schedule).collect()
    }

    async fn list_schedules_by_doctor(&self, doctor_id: DoctorId) -> Result<Vec<Schedule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, doctor_id, schedule_date, start_time, end_time,
                   total_quota, created_at, updated_at
            FROM doctor_schedules
            WHERE doctor_id = $1
            ORDER BY schedule_date, start_time, id
            "#,
        )
        .bind(doctor_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_schedule).collect()
    }

    async fn create_schedule(
        &self,
        cmd: &CreateSchedule,
        mut audit: AuditEntry,
    ) -> Result<Schedule> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO doctor_schedules
                (doctor_id, schedule_date, start_time, end_time, total_quota)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, doctor_id, schedule_date, start_time, end_time,
                      total_quota, created_at, updated_at
            "#,
        )
        .bind(cmd.doctor_id.as_uuid())
        .bind(cmd.schedule_date)
        .bind(cmd.start_time)
        .bind(cmd.end_time)
        .bind(cmd.total_quota)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_err)?;

        let schedule = Self::row_to_schedule(&row)?;

        audit.entity_id = Some(schedule.id.to_string());
        if audit.new_value.is_none() {
            audit.new_value = serde_json::to_value(&schedule).ok();
        }
        Self::insert_audit(&mut tx, &audit).await?;

        tx.commit().await?;
        Ok(schedule)
    }

    async fn update_schedule(&self, schedule: &Schedule, audit: AuditEntry) -> Result<Schedule> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE doctor_schedules
            SET doctor_id = $2, schedule_date = $3, start_time = $4,
                end_time = $5, total_quota = $6, updated_at = now()
            WHERE id = $1
            RETURNING id, doctor_id, schedule_date, start_time, end_time,
                      total_quota, created_at, updated_at
            "#,
        )
        .bind(schedule.id.as_i32())
        .bind(schedule.doctor_id.as_uuid())
        .bind(schedule.schedule_date)
        .bind(schedule.start_time)
        .bind(schedule.end_time)
        .bind(schedule.total_quota)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_err)?;

        let updated = Self::row_to_schedule(&row)?;
        Self::insert_audit(&mut tx, &audit).await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_schedule(&self, id: ScheduleId, audit: AuditEntry) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let affected = sqlx::query("DELETE FROM doctor_schedules WHERE id = $1")
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?
            .rows_affected();

        if affected == 0 {
            return Ok(0);
        }

        Self::insert_audit(&mut tx, &audit).await?;
        tx.commit().await?;
        Ok(affected)
    }

    async fn schedule_counters(&self, id: ScheduleId) -> Result<ScheduleCounters> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) FILTER (WHERE status <> 'cancelled') AS booked_count,
                   COALESCE(MAX(queue_number), 0) AS max_queue_number
            FROM bookings
            WHERE schedule_id = $1
            "#,
        )
        .bind(id.as_i32())
        .fetch_one(&self.pool)
        .await?;

        Ok(ScheduleCounters {
            booked_count: row.try_get("booked_count")?,
            max_queue_number: row.try_get("max_queue_number")?,
        })
    }

    async fn quota_snapshots(
        &self,
        from_date: NaiveDate,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<QuotaSnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT s.id AS schedule_id,
                   s.total_quota,
                   (s.total_quota
                    - COUNT(b.id) FILTER (WHERE b.status <> 'cancelled'))::int
                       AS remaining_quota,
                   COALESCE(MAX(b.queue_number), 0) AS max_queue_number,
                   s.schedule_date
            FROM doctor_schedules s
            LEFT JOIN bookings b ON b.schedule_id = s.id
            WHERE s.schedule_date >= $1
            GROUP BY s.id, s.total_quota, s.schedule_date
            ORDER BY s.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(from_date)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(QuotaSnapshot {
                    schedule_id: ScheduleId::new(row.try_get("schedule_id")?),
                    total_quota: row.try_get("total_quota")?,
                    remaining_quota: row.try_get("remaining_quota")?,
                    max_queue_number: row.try_get("max_queue_number")?,
                    schedule_date: row.try_get("schedule_date")?,
                })
            })
            .collect()
    }

    async fn insert_booking(&self, new: &NewBooking) -> Result<Booking> {
        let row = sqlx::query(
            r#"
            INSERT INTO bookings (patient_id, schedule_id, booking_code, queue_number, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING id, patient_id, schedule_id, booking_code, queue_number,
                      status::text AS status, created_at, updated_at
            "#,
        )
        .bind(new.patient_id.as_uuid())
        .bind(new.schedule_id.as_i32())
        .bind(&new.booking_code)
        .bind(new.queue_number)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        Self::row_to_booking(&row)
    }

    async fn find_booking(&self, id: BookingId) -> Result<Option<Booking>> {
        let row = sqlx::query(
            r#"
            SELECT id, patient_id, schedule_id, booking_code, queue_number,
                   status::text AS status, created_at, updated_at
            FROM bookings
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_booking).transpose()
    }

    async fn find_booking_with_schedule(
        &self,
        id: BookingId,
    ) -> Result<Option<BookingWithSchedule>> {
        let sql = format!("{BOOKING_WITH_SCHEDULE_SELECT} WHERE b.id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_booking_with_schedule).transpose()
    }

    async fn find_active_booking(
        &self,
        patient_id: PatientId,
        schedule_id: ScheduleId,
    ) -> Result<Option<Booking>> {
        let row = sqlx::query(
            r#"
            SELECT id, patient_id, schedule_id, booking_code, queue_number,
                   status::text AS status, created_at, updated_at
            FROM bookings
            WHERE patient_id = $1 AND schedule_id = $2 AND status <> 'cancelled'
            LIMIT 1
            "#,
        )
        .bind(patient_id.as_uuid())
        .bind(schedule_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_booking).transpose()
    }

    async fn list_bookings_for_patient(
        &self,
        patient_id: PatientId,
    ) -> Result<Vec<BookingWithSchedule>> {
        let sql = format!("{BOOKING_WITH_SCHEDULE_SELECT} WHERE b.patient_id = $1 ORDER BY b.created_at DESC");
        let rows = sqlx::query(&sql)
            .bind(patient_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_booking_with_schedule).collect()
    }

    async fn cancel_booking(&self, id: BookingId) -> Result<u64> {
        let affected = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'cancelled', updated_at = now()
            WHERE id = $1 AND status <> 'cancelled'
            "#,
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected)
    }
}
