//! Fast-store adapter and the quota reservation engine.
//!
//! The engine owns the fast-store keyspace for every schedule and is
//! the only component allowed to mutate it. The hot reservation path
//! runs a single atomic script; the administrative paths serialize per
//! schedule through an in-process lock table.

pub mod engine;
pub mod error;
pub mod fast;
pub mod memory;
pub mod redis;

pub use self::engine::{
    QUEUE_KEY_PREFIX, QUOTA_KEY_PREFIX, ReservationEngine, queue_key, quota_key,
};
pub use self::error::{FastStoreError, ReservationError, Result};
pub use self::fast::{FastStore, KeyWrite};
pub use self::memory::InMemoryFastStore;
pub use self::redis::RedisFastStore;
