//! Administrative schedule endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use booking_store::BookingStore;
use chrono::{NaiveDate, NaiveTime};
use common::{DoctorId, ScheduleId};
use domain::{CreateSchedule, Schedule, UpdateSchedule};
use reservation::FastStore;
use scheduling::ScheduleWithQuota;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ActingUser;
use super::bookings::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    pub doctor_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct ScheduleResponse {
    pub id: ScheduleId,
    pub doctor_id: DoctorId,
    pub schedule_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub total_quota: i32,
    pub remaining_quota: i64,
}

impl ScheduleResponse {
    fn new(schedule: Schedule, remaining_quota: i64) -> Self {
        Self {
            id: schedule.id,
            doctor_id: schedule.doctor_id,
            schedule_date: schedule.schedule_date,
            start_time: schedule.start_time,
            end_time: schedule.end_time,
            total_quota: schedule.total_quota,
            remaining_quota,
        }
    }
}

impl From<ScheduleWithQuota> for ScheduleResponse {
    fn from(with_quota: ScheduleWithQuota) -> Self {
        let remaining = with_quota.remaining_quota;
        Self::new(with_quota.schedule, remaining)
    }
}

#[derive(Serialize)]
pub struct ScheduleListResponse {
    pub schedules: Vec<ScheduleResponse>,
    pub total: usize,
}

/// POST /schedules — create a schedule.
#[tracing::instrument(skip(state, actor, cmd))]
pub async fn create<S, F>(
    State(state): State<Arc<AppState<S, F>>>,
    actor: ActingUser,
    Json(cmd): Json<CreateSchedule>,
) -> Result<(StatusCode, Json<ScheduleResponse>), ApiError>
where
    S: BookingStore + 'static,
    F: FastStore + 'static,
{
    let schedule = state.admin.create_schedule(actor.0, cmd).await?;
    let remaining = i64::from(schedule.total_quota);
    Ok((
        StatusCode::CREATED,
        Json(ScheduleResponse::new(schedule, remaining)),
    ))
}

/// GET /schedules — list schedules, optionally filtered by doctor.
#[tracing::instrument(skip(state))]
pub async fn list<S, F>(
    State(state): State<Arc<AppState<S, F>>>,
    Query(params): Query<ListParams>,
) -> Result<Json<ScheduleListResponse>, ApiError>
where
    S: BookingStore + 'static,
    F: FastStore + 'static,
{
    let schedules = match params.doctor_id {
        Some(doctor_id) => {
            state
                .admin
                .list_schedules_by_doctor(DoctorId::from_uuid(doctor_id))
                .await?
        }
        None => state.admin.list_schedules().await?,
    };

    let schedules: Vec<ScheduleResponse> =
        schedules.into_iter().map(ScheduleResponse::from).collect();
    let total = schedules.len();
    Ok(Json(ScheduleListResponse { schedules, total }))
}

/// GET /schedules/{id} — one schedule with its live remaining quota.
#[tracing::instrument(skip(state))]
pub async fn get<S, F>(
    State(state): State<Arc<AppState<S, F>>>,
    Path(id): Path<i32>,
) -> Result<Json<ScheduleResponse>, ApiError>
where
    S: BookingStore + 'static,
    F: FastStore + 'static,
{
    let with_quota = state.admin.get_schedule(ScheduleId::new(id)).await?;
    Ok(Json(with_quota.into()))
}

/// PUT /schedules/{id} — apply a partial update.
#[tracing::instrument(skip(state, actor, cmd))]
pub async fn update<S, F>(
    State(state): State<Arc<AppState<S, F>>>,
    actor: ActingUser,
    Path(id): Path<i32>,
    Json(cmd): Json<UpdateSchedule>,
) -> Result<Json<ScheduleResponse>, ApiError>
where
    S: BookingStore + 'static,
    F: FastStore + 'static,
{
    let id = ScheduleId::new(id);
    state.admin.update_schedule(actor.0, id, cmd).await?;
    let with_quota = state.admin.get_schedule(id).await?;
    Ok(Json(with_quota.into()))
}

/// DELETE /schedules/{id} — delete a schedule.
#[tracing::instrument(skip(state, actor))]
pub async fn delete<S, F>(
    State(state): State<Arc<AppState<S, F>>>,
    actor: ActingUser,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError>
where
    S: BookingStore + 'static,
    F: FastStore + 'static,
{
    state
        .admin
        .delete_schedule(actor.0, ScheduleId::new(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
