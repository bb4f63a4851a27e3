use thiserror::Error;

/// Errors that can occur when interacting with the durable store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint was violated. The PostgreSQL implementation
    /// maps SQL state 23505 here, carrying the constraint name.
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A foreign key constraint was violated (SQL state 23503).
    #[error("foreign key constraint violated: {constraint}")]
    ForeignKeyViolation { constraint: String },

    /// A stored row held a value the domain cannot represent.
    #[error("invalid stored data: {0}")]
    InvalidData(String),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if this is a unique violation whose constraint name
    /// contains `name` (case-insensitive).
    pub fn is_unique_violation(&self, name: &str) -> bool {
        match self {
            StoreError::UniqueViolation { constraint } => {
                constraint.to_lowercase().contains(&name.to_lowercase())
            }
            _ => false,
        }
    }

    /// Returns true if this is a foreign key violation whose constraint
    /// name contains `name` (case-insensitive).
    pub fn is_foreign_key_violation(&self, name: &str) -> bool {
        match self {
            StoreError::ForeignKeyViolation { constraint } => {
                constraint.to_lowercase().contains(&name.to_lowercase())
            }
            _ => false,
        }
    }
}

/// Result type for durable store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_matches_by_substring() {
        let err = StoreError::UniqueViolation {
            constraint: "uq_bookings_patient_schedule_active".to_string(),
        };
        assert!(err.is_unique_violation("booking"));
        assert!(err.is_unique_violation("BOOKING"));
        assert!(!err.is_unique_violation("doctor"));
        assert!(!err.is_foreign_key_violation("booking"));
    }

    #[test]
    fn foreign_key_violation_matches_by_substring() {
        let err = StoreError::ForeignKeyViolation {
            constraint: "fk_doctor_schedules_doctor".to_string(),
        };
        assert!(err.is_foreign_key_violation("doctor"));
        assert!(!err.is_unique_violation("doctor"));
    }
}
