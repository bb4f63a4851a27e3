//! API server entry point.

use api::config::Config;
use booking_store::{BookingStore, InMemoryBookingStore, PostgresBookingStore};
use metrics_exporter_prometheus::PrometheusHandle;
use reservation::{FastStore, InMemoryFastStore, RedisFastStore};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Resolves once SIGINT or SIGTERM arrives.
///
/// Completion tells axum to stop accepting bookings and finish
/// in-flight requests; after the server drains, `run` still stops the
/// lock sweeper before the process exits.
async fn shutdown_signal() {
    let interrupt = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {
            tracing::info!(signal = "SIGINT", "shutting down booking service");
        }
        () = terminate => {
            tracing::info!(signal = "SIGTERM", "shutting down booking service");
        }
    }
}

/// Syncs the fast store, starts the lock sweeper, and serves until
/// shutdown. The startup sync must finish before the listener binds:
/// admitting bookings against an unsynced fast store would gate them on
/// garbage counters.
async fn run<S, F>(config: Config, metrics_handle: PrometheusHandle, store: S, fast: F)
where
    S: BookingStore + Clone + 'static,
    F: FastStore + Clone + 'static,
{
    let (state, engine) = api::create_state(store, fast);

    engine
        .sync_on_startup()
        .await
        .expect("startup fast-store sync failed");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run_lock_sweeper(shutdown_rx).await })
    };

    let app = api::create_app(state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "booking service accepting traffic");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    let _ = sweeper.await;
    tracing::info!("booking service stopped, lock sweeper drained");
}

#[tokio::main]
async fn main() {
    // Logging and metrics come up before anything that can fail, so
    // storage wiring and the startup sync are observable.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // Pick the storage tiers: PostgreSQL + Redis when configured,
    // otherwise the in-memory pair for local development.
    let config = Config::from_env();

    match (config.database_url.clone(), config.redis_url.clone()) {
        (Some(database_url), Some(redis_url)) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(&database_url)
                .await
                .expect("failed to connect to PostgreSQL");
            let store = PostgresBookingStore::new(pool);
            store.run_migrations().await.expect("migrations failed");

            let fast = RedisFastStore::connect(&redis_url)
                .await
                .expect("failed to connect to Redis");

            run(config, metrics_handle, store, fast).await;
        }
        _ => {
            tracing::warn!(
                "DATABASE_URL and/or REDIS_URL not set, falling back to in-memory stores"
            );
            run(
                config,
                metrics_handle,
                InMemoryBookingStore::new(),
                InMemoryFastStore::new(),
            )
            .await;
        }
    }
}
