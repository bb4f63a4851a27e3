//! End-to-end flows across the coordinator, administrator, and engine.

use std::sync::Arc;

use booking_store::{BookingStore, InMemoryBookingStore};
use chrono::{Duration, NaiveTime, Utc};
use common::{DoctorId, PatientId};
use domain::{CreateSchedule, Schedule, UpdateSchedule};
use reservation::{InMemoryFastStore, ReservationEngine, quota_key, queue_key};
use scheduling::{BookingCoordinator, BookingError, ScheduleAdmin};

type Engine = ReservationEngine<InMemoryFastStore, InMemoryBookingStore>;

struct System {
    coordinator: Arc<BookingCoordinator<InMemoryBookingStore, InMemoryFastStore>>,
    admin: ScheduleAdmin<InMemoryBookingStore, InMemoryFastStore>,
    engine: Arc<Engine>,
    store: InMemoryBookingStore,
    fast: InMemoryFastStore,
}

fn system() -> System {
    let fast = InMemoryFastStore::new();
    let store = InMemoryBookingStore::new();
    let engine = Arc::new(ReservationEngine::new(fast.clone(), store.clone()));
    System {
        coordinator: Arc::new(BookingCoordinator::new(store.clone(), engine.clone())),
        admin: ScheduleAdmin::new(store.clone(), engine.clone()),
        engine,
        store,
        fast,
    }
}

fn create_cmd(quota: i32, days_ahead: i64) -> CreateSchedule {
    CreateSchedule {
        doctor_id: DoctorId::new(),
        schedule_date: Utc::now().date_naive() + Duration::days(days_ahead),
        start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        end_time: NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        total_quota: quota,
    }
}

async fn active_count(store: &InMemoryBookingStore, schedule: &Schedule) -> i64 {
    store
        .schedule_counters(schedule.id)
        .await
        .unwrap()
        .booked_count
}

#[tokio::test]
async fn capacity_invariant_holds_under_concurrent_churn() {
    let sys = system();
    let schedule = sys.admin.create_schedule(None, create_cmd(5, 1)).await.unwrap();

    // 20 patients race for 5 slots; some winners cancel and new
    // patients race for the freed slots.
    let mut handles = Vec::new();
    for _ in 0..20 {
        let coordinator = sys.coordinator.clone();
        let schedule_id = schedule.id;
        handles.push(tokio::spawn(async move {
            coordinator.create_booking(PatientId::new(), schedule_id).await
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        if let Ok(result) = handle.await.unwrap() {
            winners.push(result.booking);
        }
    }
    assert_eq!(winners.len(), 5);
    assert_eq!(active_count(&sys.store, &schedule).await, 5);

    // Cancel two winners, then a second wave of six competes.
    for booking in winners.iter().take(2) {
        sys.coordinator
            .cancel_booking(booking.patient_id, booking.id)
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..6 {
        let coordinator = sys.coordinator.clone();
        let schedule_id = schedule.id;
        handles.push(tokio::spawn(async move {
            coordinator.create_booking(PatientId::new(), schedule_id).await
        }));
    }
    let mut second_wave = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            second_wave += 1;
        }
    }

    assert_eq!(second_wave, 2);
    // The invariant: active bookings never exceed capacity.
    assert_eq!(active_count(&sys.store, &schedule).await, 5);
    assert_eq!(sys.fast.value_of(&quota_key(schedule.id)), Some(0));
}

#[tokio::test]
async fn queue_numbers_are_unique_and_increasing_across_churn() {
    let sys = system();
    let schedule = sys.admin.create_schedule(None, create_cmd(3, 1)).await.unwrap();

    let first = sys
        .coordinator
        .create_booking(PatientId::new(), schedule.id)
        .await
        .unwrap();
    sys.coordinator
        .cancel_booking(first.booking.patient_id, first.booking.id)
        .await
        .unwrap();

    let mut numbers = vec![first.booking.queue_number];
    for _ in 0..3 {
        let booked = sys
            .coordinator
            .create_booking(PatientId::new(), schedule.id)
            .await
            .unwrap();
        numbers.push(booked.booking.queue_number);
    }

    // Strictly increasing, no reuse of the cancelled number.
    assert_eq!(numbers, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn resync_after_bookings_matches_live_state() {
    let sys = system();
    let schedule = sys.admin.create_schedule(None, create_cmd(5, 1)).await.unwrap();

    for _ in 0..3 {
        sys.coordinator
            .create_booking(PatientId::new(), schedule.id)
            .await
            .unwrap();
    }
    let live_quota = sys.fast.value_of(&quota_key(schedule.id));

    sys.engine
        .sync_schedule(schedule.id, schedule.total_quota, schedule.schedule_date)
        .await
        .unwrap();

    assert_eq!(sys.fast.value_of(&quota_key(schedule.id)), live_quota);
    assert_eq!(sys.fast.value_of(&queue_key(schedule.id)), Some(3));
}

#[tokio::test]
async fn capacity_cut_below_live_quota_limits_new_bookings() {
    let sys = system();
    let schedule = sys.admin.create_schedule(None, create_cmd(10, 1)).await.unwrap();

    for _ in 0..4 {
        sys.coordinator
            .create_booking(PatientId::new(), schedule.id)
            .await
            .unwrap();
    }
    assert_eq!(sys.fast.value_of(&quota_key(schedule.id)), Some(6));

    sys.admin
        .update_schedule(
            None,
            schedule.id,
            UpdateSchedule {
                total_quota: Some(6),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(sys.fast.value_of(&quota_key(schedule.id)), Some(2));

    let mut handles = Vec::new();
    for _ in 0..3 {
        let coordinator = sys.coordinator.clone();
        let schedule_id = schedule.id;
        handles.push(tokio::spawn(async move {
            coordinator.create_booking(PatientId::new(), schedule_id).await
        }));
    }

    let mut booked = 0;
    let mut full = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => booked += 1,
            Err(BookingError::QuotaFull) => full += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(booked, 2);
    assert_eq!(full, 1);
}

#[tokio::test]
async fn cold_start_recovery_restores_booking_traffic() {
    let sys = system();
    let s1 = sys.admin.create_schedule(None, create_cmd(3, 1)).await.unwrap();
    let s2 = sys.admin.create_schedule(None, create_cmd(2, 2)).await.unwrap();

    sys.coordinator
        .create_booking(PatientId::new(), s1.id)
        .await
        .unwrap();
    sys.coordinator
        .create_booking(PatientId::new(), s1.id)
        .await
        .unwrap();

    // The fast store dies entirely.
    sys.fast.flush();

    sys.engine.sync_on_startup().await.unwrap();

    assert_eq!(sys.fast.value_of(&quota_key(s1.id)), Some(1));
    assert_eq!(sys.fast.value_of(&queue_key(s1.id)), Some(2));
    assert_eq!(sys.fast.value_of(&quota_key(s2.id)), Some(2));

    // Traffic resumes where durable truth says it should.
    let next = sys
        .coordinator
        .create_booking(PatientId::new(), s1.id)
        .await
        .unwrap();
    assert_eq!(next.booking.queue_number, 3);
    assert!(matches!(
        sys.coordinator.create_booking(PatientId::new(), s1.id).await,
        Err(BookingError::QuotaFull)
    ));
}

#[tokio::test]
async fn one_active_booking_per_patient_and_schedule() {
    let sys = system();
    let schedule = sys.admin.create_schedule(None, create_cmd(5, 1)).await.unwrap();
    let patient = PatientId::new();

    let first = sys
        .coordinator
        .create_booking(patient, schedule.id)
        .await
        .unwrap();
    assert!(matches!(
        sys.coordinator.create_booking(patient, schedule.id).await,
        Err(BookingError::AlreadyBooked)
    ));

    // Cancelling frees the patient to book the same schedule again.
    sys.coordinator
        .cancel_booking(patient, first.booking.id)
        .await
        .unwrap();
    let second = sys
        .coordinator
        .create_booking(patient, schedule.id)
        .await
        .unwrap();
    assert_eq!(second.booking.queue_number, 2);
    assert_eq!(active_count(&sys.store, &schedule).await, 1);
}
