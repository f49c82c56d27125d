//! HTTP API server for the flight booking service.
//!
//! Provides REST endpoints for booking, cancellation and lookups, with
//! structured logging (tracing) and Prometheus metrics. Collaborators are
//! picked at startup: PostgreSQL or in-memory stores, an HTTP or seeded
//! in-memory inventory authority.

pub mod config;
pub mod error;
pub mod notifier;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use domain::{FlightSnapshot, Money};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    BookingOrchestrator, ChannelEventPublisher, CircuitBreaker, EventPublisher,
    HttpInventoryClient, InMemoryEventPublisher, InMemoryInventoryClient, InventoryClient,
    InventoryError, PublishedMessage,
};
use sqlx::postgres::PgPoolOptions;
use store::{
    BookingStore, InMemoryBookingStore, InMemoryPassengerStore, PassengerStore,
    PostgresBookingStore, PostgresPassengerStore,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::bookings::AppState;

/// Capacity of the queue between the publisher and the notifier.
const NOTIFICATION_QUEUE_CAPACITY: usize = 1024;

/// Errors that abort startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Inventory client setup failed: {0}")]
    Inventory(#[from] InventoryError),
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/booking/{id}",
            post(routes::bookings::create).get(routes::bookings::get),
        )
        .route("/booking/history/{email}", get(routes::bookings::history))
        .route("/booking/cancel/{pnr}", delete(routes::bookings::cancel))
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

/// Handles to the in-memory collaborators behind a default state.
#[derive(Clone)]
pub struct InMemoryBackends {
    pub bookings: Arc<InMemoryBookingStore>,
    pub passengers: Arc<InMemoryPassengerStore>,
    pub inventory: Arc<InMemoryInventoryClient>,
    pub publisher: Arc<InMemoryEventPublisher>,
}

/// Creates an application state backed entirely by in-memory collaborators,
/// with the demo flights seeded.
pub async fn create_default_state(config: &Config) -> (Arc<AppState>, InMemoryBackends) {
    let backends = InMemoryBackends {
        bookings: Arc::new(InMemoryBookingStore::new()),
        passengers: Arc::new(InMemoryPassengerStore::new()),
        inventory: Arc::new(InMemoryInventoryClient::new()),
        publisher: Arc::new(InMemoryEventPublisher::new()),
    };
    seed_demo_flights(&backends.inventory).await;

    let state = assemble(
        config,
        backends.bookings.clone(),
        backends.passengers.clone(),
        backends.inventory.clone(),
        backends.publisher.clone(),
    );
    (state, backends)
}

/// Builds the application state from configuration.
///
/// Returns the state and the receiving end of the notification queue.
pub async fn build_state(
    config: &Config,
) -> Result<(Arc<AppState>, mpsc::Receiver<PublishedMessage>), StartupError> {
    let (bookings, passengers): (Arc<dyn BookingStore>, Arc<dyn PassengerStore>) =
        match &config.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
                store::run_migrations(&pool).await?;
                tracing::info!("using PostgreSQL booking ledger");
                (
                    Arc::new(PostgresBookingStore::new(pool.clone())),
                    Arc::new(PostgresPassengerStore::new(pool)),
                )
            }
            None => {
                tracing::warn!("DATABASE_URL not set, bookings are kept in memory");
                (
                    Arc::new(InMemoryBookingStore::new()),
                    Arc::new(InMemoryPassengerStore::new()),
                )
            }
        };

    let inventory: Arc<dyn InventoryClient> = match &config.inventory_url {
        Some(url) => {
            tracing::info!(%url, "using remote inventory authority");
            Arc::new(HttpInventoryClient::new(url, config.inventory_timeout)?)
        }
        None => {
            tracing::warn!("INVENTORY_URL not set, using seeded in-memory inventory");
            let inventory = InMemoryInventoryClient::new();
            seed_demo_flights(&inventory).await;
            Arc::new(inventory)
        }
    };

    let (publisher, notifications) = ChannelEventPublisher::new(NOTIFICATION_QUEUE_CAPACITY);
    let state = assemble(config, bookings, passengers, inventory, Arc::new(publisher));
    Ok((state, notifications))
}

fn assemble(
    config: &Config,
    bookings: Arc<dyn BookingStore>,
    passengers: Arc<dyn PassengerStore>,
    inventory: Arc<dyn InventoryClient>,
    publisher: Arc<dyn EventPublisher>,
) -> Arc<AppState> {
    let breaker = CircuitBreaker::new("inventory", config.breaker_config());
    let orchestrator = BookingOrchestrator::new(bookings, passengers, inventory, breaker, publisher)
        .with_config(config.orchestrator_config());
    Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
    })
}

/// Flights available when no inventory authority is configured.
pub fn demo_flights() -> Vec<FlightSnapshot> {
    let flight = |id: &str, airline: &str, source: &str, destination: &str, seats, cents| {
        FlightSnapshot {
            flight_id: id.into(),
            available_seats: seats,
            price: Money::from_cents(cents),
            source: source.to_string(),
            destination: destination.to_string(),
            airline_name: airline.to_string(),
        }
    };
    vec![
        flight("FL-1001", "IndiGo", "DEL", "BOM", 180, 450_000),
        flight("FL-1002", "Air India", "BLR", "HYD", 120, 389_950),
        flight("FL-1003", "SpiceJet", "BOM", "GOI", 2, 299_900),
    ]
}

async fn seed_demo_flights(inventory: &InMemoryInventoryClient) {
    for flight in demo_flights() {
        inventory.add_flight(flight).await;
    }
}
