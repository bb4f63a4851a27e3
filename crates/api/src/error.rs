//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use scheduling::{AdminError, BookingError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or malformed caller identity.
    Unauthorized(String),
    /// Booking flow error.
    Booking(BookingError),
    /// Schedule administration error.
    Admin(AdminError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Booking(err) => booking_error_to_response(err),
            ApiError::Admin(err) => admin_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn booking_error_to_response(err: BookingError) -> (StatusCode, String) {
    match &err {
        BookingError::ScheduleNotFound | BookingError::BookingNotFound => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        BookingError::SchedulePast => (StatusCode::BAD_REQUEST, err.to_string()),
        BookingError::AlreadyBooked
        | BookingError::QuotaFull
        | BookingError::AlreadyCancelled => (StatusCode::CONFLICT, err.to_string()),
        BookingError::BookingNotOwned => (StatusCode::FORBIDDEN, err.to_string()),
        BookingError::Store(_) | BookingError::Reservation(_) => {
            tracing::error!(error = %err, "booking transport error");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

fn admin_error_to_response(err: AdminError) -> (StatusCode, String) {
    match &err {
        AdminError::ScheduleNotFound | AdminError::DoctorNotFound => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        AdminError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        AdminError::Store(_) => {
            tracing::error!(error = %err, "admin transport error");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        ApiError::Booking(err)
    }
}

impl From<AdminError> for ApiError {
    fn from(err: AdminError) -> Self {
        ApiError::Admin(err)
    }
}
