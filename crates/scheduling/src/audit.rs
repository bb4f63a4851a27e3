//! Audit-entry builders for administrative actions.

use booking_store::AuditEntry;
use common::UserId;

pub const ACTION_SCHEDULE_CREATE: &str = "schedule.create";
pub const ACTION_SCHEDULE_UPDATE: &str = "schedule.update";
pub const ACTION_SCHEDULE_DELETE: &str = "schedule.delete";

const ENTITY_SCHEDULE: &str = "doctor_schedule";

/// Audit entry for a creation; the store fills in the entity id and
/// created value once the row exists.
pub fn schedule_created(user_id: Option<UserId>) -> AuditEntry {
    AuditEntry {
        user_id,
        action: ACTION_SCHEDULE_CREATE.to_string(),
        entity: ENTITY_SCHEDULE,
        entity_id: None,
        old_value: None,
        new_value: None,
    }
}

/// Audit entry for an update, recording both sides of the change.
pub fn schedule_updated(
    user_id: Option<UserId>,
    entity_id: String,
    old_value: Option<serde_json::Value>,
    new_value: Option<serde_json::Value>,
) -> AuditEntry {
    AuditEntry {
        user_id,
        action: ACTION_SCHEDULE_UPDATE.to_string(),
        entity: ENTITY_SCHEDULE,
        entity_id: Some(entity_id),
        old_value,
        new_value,
    }
}

/// Audit entry for a deletion, preserving the removed value.
pub fn schedule_deleted(
    user_id: Option<UserId>,
    entity_id: String,
    old_value: Option<serde_json::Value>,
) -> AuditEntry {
    AuditEntry {
        user_id,
        action: ACTION_SCHEDULE_DELETE.to_string(),
        entity: ENTITY_SCHEDULE,
        entity_id: Some(entity_id),
        old_value,
        new_value: None,
    }
}
