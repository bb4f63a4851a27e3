//! Booking endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use booking_store::{BookingStore, BookingWithSchedule};
use chrono::{NaiveDate, NaiveTime};
use common::{BookingId, DoctorId, ScheduleId};
use domain::BookingStatus;
use reservation::FastStore;
use scheduling::{BookingCoordinator, ScheduleAdmin};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthenticatedPatient;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: BookingStore, F: FastStore> {
    pub coordinator: BookingCoordinator<S, F>,
    pub admin: ScheduleAdmin<S, F>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateBookingRequest {
    pub schedule_id: i32,
}

// -- Response types --

#[derive(Serialize)]
pub struct ScheduleSummary {
    pub id: ScheduleId,
    pub doctor_id: DoctorId,
    pub schedule_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub total_quota: i32,
}

#[derive(Serialize)]
pub struct BookingResponse {
    pub id: BookingId,
    pub booking_code: String,
    pub queue_number: i32,
    pub status: BookingStatus,
    pub schedule: ScheduleSummary,
}

impl From<BookingWithSchedule> for BookingResponse {
    fn from(full: BookingWithSchedule) -> Self {
        Self {
            id: full.booking.id,
            booking_code: full.booking.booking_code,
            queue_number: full.booking.queue_number,
            status: full.booking.status,
            schedule: ScheduleSummary {
                id: full.schedule.id,
                doctor_id: full.schedule.doctor_id,
                schedule_date: full.schedule.schedule_date,
                start_time: full.schedule.start_time,
                end_time: full.schedule.end_time,
                total_quota: full.schedule.total_quota,
            },
        }
    }
}

#[derive(Serialize)]
pub struct BookingListResponse {
    pub bookings: Vec<BookingResponse>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub booking_id: BookingId,
    pub status: BookingStatus,
}

// -- Handlers --

/// POST /bookings — book a slot on a schedule for the caller.
#[tracing::instrument(skip(state, patient, req), fields(schedule_id = req.schedule_id))]
pub async fn create<S, F>(
    State(state): State<Arc<AppState<S, F>>>,
    patient: AuthenticatedPatient,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), ApiError>
where
    S: BookingStore + 'static,
    F: FastStore + 'static,
{
    let result = state
        .coordinator
        .create_booking(patient.0, ScheduleId::new(req.schedule_id))
        .await?;

    Ok((StatusCode::CREATED, Json(result.into())))
}

/// PUT /bookings/{id}/cancel — cancel the caller's booking.
#[tracing::instrument(skip(state, patient))]
pub async fn cancel<S, F>(
    State(state): State<Arc<AppState<S, F>>>,
    patient: AuthenticatedPatient,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelResponse>, ApiError>
where
    S: BookingStore + 'static,
    F: FastStore + 'static,
{
    let booking_id = BookingId::from_uuid(id);
    state.coordinator.cancel_booking(patient.0, booking_id).await?;

    Ok(Json(CancelResponse {
        booking_id,
        status: BookingStatus::Cancelled,
    }))
}

/// GET /bookings — list the caller's bookings, newest first.
#[tracing::instrument(skip(state, patient))]
pub async fn list<S, F>(
    State(state): State<Arc<AppState<S, F>>>,
    patient: AuthenticatedPatient,
) -> Result<Json<BookingListResponse>, ApiError>
where
    S: BookingStore + 'static,
    F: FastStore + 'static,
{
    let bookings: Vec<BookingResponse> = state
        .coordinator
        .my_bookings(patient.0)
        .await?
        .into_iter()
        .map(BookingResponse::from)
        .collect();

    let total = bookings.len();
    Ok(Json(BookingListResponse { bookings, total }))
}
