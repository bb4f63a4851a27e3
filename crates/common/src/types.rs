use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a doctor schedule.
///
/// Schedules use a database-assigned serial id rather than a UUID; the
/// wrapper keeps them from being mixed up with quota counts or queue
/// numbers in function signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(i32);

impl ScheduleId {
    pub fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ScheduleId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl From<ScheduleId> for i32 {
    fn from(id: ScheduleId) -> Self {
        id.0
    }
}

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id! {
    /// Unique identifier for a booking.
    BookingId
}

uuid_id! {
    /// Unique identifier for a patient.
    PatientId
}

uuid_id! {
    /// Unique identifier for a doctor.
    DoctorId
}

uuid_id! {
    /// Unique identifier for an authenticated user, used for audit trails.
    UserId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_id_roundtrips_through_i32() {
        let id = ScheduleId::new(42);
        assert_eq!(id.as_i32(), 42);
        assert_eq!(ScheduleId::from(42), id);
        assert_eq!(i32::from(id), 42);
    }

    #[test]
    fn booking_id_new_creates_unique_ids() {
        let id1 = BookingId::new();
        let id2 = BookingId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn patient_id_from_uuid_preserves_value() {
        let uuid = Uuid::new_v4();
        let id = PatientId::from_uuid(uuid);
        assert_eq!(id.as_uuid(), uuid);
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = ScheduleId::new(7);
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");

        let booking = BookingId::new();
        let json = serde_json::to_string(&booking).unwrap();
        let back: BookingId = serde_json::from_str(&json).unwrap();
        assert_eq!(booking, back);
    }
}
