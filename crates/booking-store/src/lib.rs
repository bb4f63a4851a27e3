pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryBookingStore;
pub use postgres::PostgresBookingStore;
pub use store::{AuditEntry, BookingStore, BookingWithSchedule, QuotaSnapshot, ScheduleCounters};
