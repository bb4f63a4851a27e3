//! The booking coordinator.

use std::sync::Arc;

use booking_store::{BookingStore, BookingWithSchedule};
use common::{BookingId, PatientId, ScheduleId};
use domain::{NewBooking, generate_booking_code, today_utc};
use reservation::{FastStore, ReservationEngine};

use crate::error::BookingError;
use crate::run_detached;

/// Orchestrates patient bookings across the two storage tiers.
///
/// The protocol is fast-store-first: the atomic reservation decides
/// admission and assigns the queue number, then the durable insert
/// records it. A failed insert triggers compensation: the reserved
/// slot is returned on a detached deadline so a client disconnect
/// cannot leave the quota leaked.
pub struct BookingCoordinator<S, F>
where
    S: BookingStore,
    F: FastStore,
{
    store: S,
    engine: Arc<ReservationEngine<F, S>>,
}

impl<S, F> BookingCoordinator<S, F>
where
    S: BookingStore + 'static,
    F: FastStore + 'static,
{
    pub fn new(store: S, engine: Arc<ReservationEngine<F, S>>) -> Self {
        Self { store, engine }
    }

    /// Books a slot on the schedule for the patient.
    ///
    /// Pre-checks reject obvious failures before any state changes;
    /// the partial unique index on active (patient, schedule) pairs is
    /// the final guard against duplicate-booking races.
    #[tracing::instrument(skip(self))]
    pub async fn create_booking(
        &self,
        patient_id: PatientId,
        schedule_id: ScheduleId,
    ) -> Result<BookingWithSchedule, BookingError> {
        metrics::counter!("bookings_attempted_total").increment(1);

        // 1. Schedule must exist and not lie in the past.
        let schedule = self
            .store
            .find_schedule(schedule_id)
            .await?
            .ok_or(BookingError::ScheduleNotFound)?;
        if schedule.is_past(today_utc()) {
            return Err(BookingError::SchedulePast);
        }

        // 2. Early duplicate rejection.
        if self
            .store
            .find_active_booking(patient_id, schedule_id)
            .await?
            .is_some()
        {
            return Err(BookingError::AlreadyBooked);
        }

        // 3. Atomic reservation: quota down, queue number out.
        let queue_number = self.engine.reserve_slot(schedule_id).await?;

        // 4–5. Record the reservation durably.
        let new = NewBooking {
            patient_id,
            schedule_id,
            booking_code: generate_booking_code(schedule.schedule_date),
            queue_number,
        };
        let booking = match self.store.insert_booking(&new).await {
            Ok(booking) => booking,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    %schedule_id,
                    "booking insert failed, compensating reservation"
                );
                let engine = self.engine.clone();
                run_detached("restore slot after failed insert", async move {
                    engine.restore_slot(schedule_id).await
                })
                .await;

                if err.is_unique_violation("booking") {
                    return Err(BookingError::AlreadyBooked);
                }
                return Err(BookingError::Store(err));
            }
        };

        metrics::counter!("bookings_created_total").increment(1);
        tracing::info!(
            booking_id = %booking.id,
            %schedule_id,
            queue_number,
            code = %booking.booking_code,
            "booking created"
        );

        // 6. Reload with the joined schedule; fall back to what we have.
        match self.store.find_booking_with_schedule(booking.id).await {
            Ok(Some(full)) => Ok(full),
            Ok(None) => Ok(BookingWithSchedule { booking, schedule }),
            Err(err) => {
                tracing::warn!(error = %err, booking_id = %booking.id, "booking reload failed");
                Ok(BookingWithSchedule { booking, schedule })
            }
        }
    }

    /// Cancels the patient's booking and returns its slot to the pool.
    ///
    /// The durable status transition is atomic; when it reports zero
    /// affected rows the booking was already cancelled and the quota is
    /// deliberately *not* restored again.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_booking(
        &self,
        patient_id: PatientId,
        booking_id: BookingId,
    ) -> Result<(), BookingError> {
        let booking = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound)?;
        if booking.patient_id != patient_id {
            return Err(BookingError::BookingNotOwned);
        }

        let affected = self.store.cancel_booking(booking_id).await?;
        if affected == 0 {
            return Err(BookingError::AlreadyCancelled);
        }

        let engine = self.engine.clone();
        let schedule_id = booking.schedule_id;
        run_detached("restore slot after cancel", async move {
            engine.restore_slot(schedule_id).await
        })
        .await;

        metrics::counter!("bookings_cancelled_total").increment(1);
        tracing::info!(%booking_id, %schedule_id, "booking cancelled");
        Ok(())
    }

    /// The patient's bookings with their schedules, newest first.
    pub async fn my_bookings(
        &self,
        patient_id: PatientId,
    ) -> Result<Vec<BookingWithSchedule>, BookingError> {
        Ok(self.store.list_bookings_for_patient(patient_id).await?)
    }
}
