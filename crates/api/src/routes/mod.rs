//! HTTP route handlers and shared extractors.

pub mod bookings;
pub mod health;
pub mod metrics;
pub mod schedules;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{PatientId, UserId};
use uuid::Uuid;

use crate::error::ApiError;

/// The authenticated patient, taken from the `X-Patient-Id` header that
/// the upstream authentication layer sets after validating the caller.
pub struct AuthenticatedPatient(pub PatientId);

impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedPatient {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get("x-patient-id")
            .ok_or_else(|| ApiError::Unauthorized("missing X-Patient-Id header".to_string()))?;
        let uuid = header
            .to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or_else(|| ApiError::Unauthorized("invalid X-Patient-Id header".to_string()))?;
        Ok(Self(PatientId::from_uuid(uuid)))
    }
}

/// The administrative actor from the optional `X-User-Id` header, used
/// only for the audit trail.
pub struct ActingUser(pub Option<UserId>);

impl<S: Send + Sync> FromRequestParts<S> for ActingUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get("x-user-id") else {
            return Ok(Self(None));
        };
        let uuid = header
            .to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value).ok())
            .ok_or_else(|| ApiError::BadRequest("invalid X-User-Id header".to_string()))?;
        Ok(Self(Some(UserId::from_uuid(uuid))))
    }
}
