//! Booking and schedule-administration services.
//!
//! `BookingCoordinator` drives the patient-facing booking protocol:
//! durable pre-checks, the atomic fast-store reservation, the durable
//! insert, and compensation when the insert fails. `ScheduleAdmin`
//! drives administrative schedule changes, committing to the durable
//! store first and reconciling the fast store afterwards.

pub mod audit;
pub mod booking;
pub mod error;
pub mod schedule;

use std::future::Future;
use std::time::Duration;

pub use booking::BookingCoordinator;
pub use error::{AdminError, BookingError};
pub use schedule::{ScheduleAdmin, ScheduleWithQuota};

/// Budget for fast-store repairs that must outlive the inbound request.
const DETACHED_SYNC_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs a fast-store repair on its own task with its own deadline.
///
/// Compensation and admin-path reconciliation must not run on the
/// inbound request's context: a client disconnect would abandon the
/// repair mid-flight and leave the two tiers disagreeing. The spawned
/// task keeps running even if the caller's future is dropped; failures
/// are logged here and left for the next sync to repair.
pub(crate) async fn run_detached<F>(task: &'static str, fut: F)
where
    F: Future<Output = reservation::Result<()>> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        match tokio::time::timeout(DETACHED_SYNC_TIMEOUT, fut).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                metrics::counter!("fast_store_repairs_failed_total").increment(1);
                tracing::error!(task, error = %e, "detached fast-store task failed");
            }
            Err(_) => {
                metrics::counter!("fast_store_repairs_failed_total").increment(1);
                tracing::error!(task, "detached fast-store task timed out");
            }
        }
    });
    let _ = handle.await;
}
