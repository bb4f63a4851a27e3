//! HTTP API server for the appointment-booking system.
//!
//! Provides the booking endpoints, administrative schedule CRUD, and
//! the operational surface (health, Prometheus metrics), with
//! structured logging via tracing.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use booking_store::BookingStore;
use metrics_exporter_prometheus::PrometheusHandle;
use reservation::{FastStore, ReservationEngine};
use scheduling::{BookingCoordinator, ScheduleAdmin};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::bookings::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, F>(state: Arc<AppState<S, F>>, metrics_handle: PrometheusHandle) -> Router
where
    S: BookingStore + 'static,
    F: FastStore + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/bookings", post(routes::bookings::create::<S, F>))
        .route("/bookings", get(routes::bookings::list::<S, F>))
        .route(
            "/bookings/{id}/cancel",
            put(routes::bookings::cancel::<S, F>),
        )
        .route("/schedules", post(routes::schedules::create::<S, F>))
        .route("/schedules", get(routes::schedules::list::<S, F>))
        .route("/schedules/{id}", get(routes::schedules::get::<S, F>))
        .route("/schedules/{id}", put(routes::schedules::update::<S, F>))
        .route(
            "/schedules/{id}",
            axum::routing::delete(routes::schedules::delete::<S, F>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the services over the given stores and returns the shared
/// state plus the engine, which the caller still needs for the startup
/// sync and the lock sweeper.
pub fn create_state<S, F>(store: S, fast: F) -> (Arc<AppState<S, F>>, Arc<ReservationEngine<F, S>>)
where
    S: BookingStore + Clone + 'static,
    F: FastStore + Clone + 'static,
{
    let engine = Arc::new(ReservationEngine::new(fast, store.clone()));
    let coordinator = BookingCoordinator::new(store.clone(), engine.clone());
    let admin = ScheduleAdmin::new(store, engine.clone());

    (Arc::new(AppState { coordinator, admin }), engine)
}
