//! Integration tests for the booking sagas.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use common::{BookingReference, FlightId, Pnr};
use domain::{
    Booking, BookingStatus, CreateBooking, FlightSnapshot, Gender, MealType, Money, PassengerDetails,
    TripType,
};
use saga::circuit_breaker::State;
use saga::{
    BookingError, BookingOrchestrator, CircuitBreaker, CircuitBreakerConfig, ErrorKind,
    FixedClock, InMemoryEventPublisher, InMemoryInventoryClient, TOPIC_BOOKING_CANCELLED,
    TOPIC_BOOKING_CREATED, UNAVAILABLE_MESSAGE,
};
use store::{BookingStore, InMemoryBookingStore, InMemoryPassengerStore, PassengerStore};

type TestOrchestrator = BookingOrchestrator<
    InMemoryBookingStore,
    InMemoryPassengerStore,
    InMemoryInventoryClient,
    InMemoryEventPublisher,
>;

struct TestHarness {
    orchestrator: TestOrchestrator,
    bookings: InMemoryBookingStore,
    passengers: InMemoryPassengerStore,
    inventory: InMemoryInventoryClient,
    publisher: InMemoryEventPublisher,
    clock: FixedClock,
}

impl TestHarness {
    async fn new() -> Self {
        Self::with_breaker(CircuitBreakerConfig::default()).await
    }

    async fn with_breaker(config: CircuitBreakerConfig) -> Self {
        let bookings = InMemoryBookingStore::new();
        let passengers = InMemoryPassengerStore::new();
        let inventory = InMemoryInventoryClient::new();
        let publisher = InMemoryEventPublisher::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap());

        inventory.add_flight(flight("FL1", 5)).await;

        let orchestrator = BookingOrchestrator::new(
            bookings.clone(),
            passengers.clone(),
            inventory.clone(),
            CircuitBreaker::new("inventory", config),
            publisher.clone(),
        )
        .with_clock(clock.clone());

        Self {
            orchestrator,
            bookings,
            passengers,
            inventory,
            publisher,
            clock,
        }
    }

    async fn available(&self, flight_id: &str) -> u32 {
        self.inventory
            .available_seats(&FlightId::new(flight_id))
            .await
            .unwrap()
    }

    async fn book(&self, seats: &[&str]) -> Pnr {
        self.orchestrator
            .create_booking(request("FL1", seats))
            .await
            .unwrap()
            .pnr
    }
}

fn flight(id: &str, seats: u32) -> FlightSnapshot {
    FlightSnapshot {
        flight_id: FlightId::new(id),
        available_seats: seats,
        price: Money::from_cents(450_000),
        source: "DEL".to_string(),
        destination: "BOM".to_string(),
        airline_name: "IndiGo".to_string(),
    }
}

fn request(flight_id: &str, seats: &[&str]) -> CreateBooking {
    let passengers = seats
        .iter()
        .enumerate()
        .map(|(i, seat)| {
            PassengerDetails::new(
                format!("Passenger {i}"),
                30 + i as u32,
                Gender::Female,
                *seat,
                MealType::Veg,
            )
        })
        .collect();
    CreateBooking::new(flight_id, "booker@example.com", TripType::OneWay, passengers)
}

// ---------------------------------------------------------------------------
// Create saga
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_happy_path_books_and_publishes_once() {
    let h = TestHarness::new().await;

    let view = h
        .orchestrator
        .create_booking(request("FL1", &["1a", " 1B "]))
        .await
        .unwrap();

    assert!(view.pnr.as_str().starts_with("PNR-"));
    assert_eq!(view.status, BookingStatus::Booked);
    assert_eq!(view.total_amount, 9000.0);
    assert_eq!(view.airline_name.as_deref(), Some("IndiGo"));
    assert_eq!(view.source.as_deref(), Some("DEL"));
    assert_eq!(view.passengers.len(), 2);
    assert_eq!(view.passengers[0].seat_no, "1A");
    assert_eq!(view.passengers[1].seat_no, "1B");

    assert_eq!(h.available("FL1").await, 3);
    assert_eq!(h.bookings.booking_count().await, 1);
    assert_eq!(h.passengers.count_by_pnr(&view.pnr).await.unwrap(), 2);

    assert_eq!(h.publisher.attempts().await, 1);
    let created = h.publisher.published_on(TOPIC_BOOKING_CREATED).await;
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].key, view.pnr.as_str());
    assert_eq!(created[0].payload["seatsBooked"], 2);
    assert_eq!(created[0].payload["airlineName"], "IndiGo");
}

#[tokio::test]
async fn test_pnr_differs_from_booking_reference() {
    let h = TestHarness::new().await;

    let view = h
        .orchestrator
        .create_booking(request("FL1", &["2A", "2B", "2C"]))
        .await
        .unwrap();

    let reserves = h.inventory.reserve_calls().await;
    assert_eq!(reserves.len(), 1);
    let reference = &reserves[0].1.booking_reference;
    assert!(reference.as_str().starts_with("BR-"));
    assert_ne!(reference.as_str(), view.pnr.as_str());

    let stored = h.bookings.find_by_pnr(&view.pnr).await.unwrap().unwrap();
    assert_eq!(stored.seats_booked, 3);
    assert_eq!(h.passengers.count_by_pnr(&view.pnr).await.unwrap(), 3);
}

#[tokio::test]
async fn test_not_enough_seats_never_reserves() {
    let h = TestHarness::new().await;

    let err = h
        .orchestrator
        .create_booking(request("FL1", &["1A", "1B", "1C", "1D", "1E", "1F"]))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Not enough seats available");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(h.inventory.reserve_calls().await.is_empty());
    assert_eq!(h.available("FL1").await, 5);
    assert_eq!(h.bookings.booking_count().await, 0);
}

#[tokio::test]
async fn test_taken_seat_never_reserves() {
    let h = TestHarness::new().await;
    h.book(&["1A"]).await;

    let err = h
        .orchestrator
        .create_booking(request("FL1", &["1a", "2B"]))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Seat(s) already taken: 1A");
    assert_eq!(err.kind(), ErrorKind::Business);
    assert_eq!(h.inventory.reserve_calls().await.len(), 1);
    assert_eq!(h.available("FL1").await, 4);
}

#[tokio::test]
async fn test_seat_conflict_names_every_taken_seat() {
    let h = TestHarness::new().await;
    h.book(&["1A", "1B"]).await;

    let err = h
        .orchestrator
        .create_booking(request("FL1", &["1A", "1B", "3C"]))
        .await
        .unwrap_err();

    match err {
        BookingError::SeatsTaken(seats) => assert_eq!(seats, vec!["1A", "1B"]),
        other => panic!("expected SeatsTaken, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cancelled_bookings_still_hold_their_seats() {
    let h = TestHarness::new().await;
    let pnr = h.book(&["1A"]).await;
    h.orchestrator.cancel_booking(&pnr).await.unwrap();

    let err = h
        .orchestrator
        .create_booking(request("FL1", &["1A"]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::SeatsTaken(_)));
}

#[tokio::test]
async fn test_invalid_request_touches_nothing() {
    let h = TestHarness::new().await;

    let err = h
        .orchestrator
        .create_booking(CreateBooking::new(
            "FL1",
            "booker@example.com",
            TripType::OneWay,
            vec![],
        ))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.inventory.snapshot_calls().await, 0);
}

#[tokio::test]
async fn test_unknown_flight_is_not_found() {
    let h = TestHarness::new().await;

    let err = h
        .orchestrator
        .create_booking(request("FL404", &["1A"]))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Flight not found with id: FL404");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_declined_reservation_is_not_compensated() {
    let h = TestHarness::new().await;
    h.inventory
        .set_decline_reservations(Some("Flight closed".to_string()))
        .await;

    let err = h
        .orchestrator
        .create_booking(request("FL1", &["1A"]))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Seat reservation failed: Flight closed");
    assert!(h.inventory.release_calls().await.is_empty());
    assert_eq!(h.bookings.booking_count().await, 0);
}

#[tokio::test]
async fn test_inventory_outage_is_generic_unavailable() {
    let h = TestHarness::new().await;
    h.inventory.set_unavailable(true).await;

    let err = h
        .orchestrator
        .create_booking(request("FL1", &["1A"]))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), UNAVAILABLE_MESSAGE);
    assert_eq!(err.kind(), ErrorKind::Unavailable);
}

// ---------------------------------------------------------------------------
// Compensation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_passenger_save_failure_releases_exactly_once() {
    let h = TestHarness::new().await;
    h.passengers.set_fail_on_save_all(true).await;

    let err = h
        .orchestrator
        .create_booking(request("FL1", &["4A", "4B"]))
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("Failed to save passengers: "));
    assert_eq!(err.kind(), ErrorKind::Business);

    let reserves = h.inventory.reserve_calls().await;
    let releases = h.inventory.release_calls().await;
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].1, reserves[0].1);
    assert_eq!(h.available("FL1").await, 5);

    // The booking row written before the failure is discarded.
    assert_eq!(h.bookings.booking_count().await, 0);
    assert_eq!(h.publisher.attempts().await, 0);
}

#[tokio::test]
async fn test_failed_compensation_reports_both_errors() {
    let h = TestHarness::new().await;
    h.passengers.set_fail_on_save_all(true).await;
    h.inventory.set_fail_on_release(true).await;

    let err = h
        .orchestrator
        .create_booking(request("FL1", &["5A"]))
        .await
        .unwrap_err();

    let msg = err.to_string();
    assert!(msg.starts_with("Failed to save passengers: "));
    assert!(msg.contains("passenger batch write rejected"));
    assert!(msg.contains("release-seat compensation failed: "));
    assert!(matches!(err, BookingError::CompensationFailed { .. }));
    assert_eq!(h.inventory.release_calls().await.len(), 1);
    assert_eq!(h.available("FL1").await, 4);
}

#[tokio::test]
async fn test_booking_save_failure_is_compensated() {
    let h = TestHarness::new().await;
    h.bookings.set_fail_on_save(true).await;

    let err = h
        .orchestrator
        .create_booking(request("FL1", &["6A"]))
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("Failed to save booking: "));
    assert_eq!(h.inventory.release_calls().await.len(), 1);
    assert_eq!(h.available("FL1").await, 5);
    assert_eq!(h.passengers.passenger_count().await, 0);
}

#[tokio::test]
async fn test_publish_failure_does_not_fail_the_booking() {
    let h = TestHarness::new().await;
    h.publisher.set_fail_on_publish(true).await;

    let view = h
        .orchestrator
        .create_booking(request("FL1", &["7A"]))
        .await
        .unwrap();

    assert_eq!(view.status, BookingStatus::Booked);
    assert_eq!(h.publisher.attempts().await, 1);
    assert!(h.inventory.release_calls().await.is_empty());
}

// ---------------------------------------------------------------------------
// Cancel saga
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cancel_releases_every_seat_once() {
    let h = TestHarness::new().await;
    let pnr = h.book(&["8A", "8B"]).await;
    assert_eq!(h.available("FL1").await, 3);

    let view = h.orchestrator.cancel_booking(&pnr).await.unwrap();

    assert_eq!(view.status, BookingStatus::Cancelled);
    let releases = h.inventory.release_calls().await;
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].1.booking_reference, BookingReference::from(&pnr));
    assert_eq!(releases[0].1.count, 2);
    assert_eq!(releases[0].1.seat_numbers, vec!["8A", "8B"]);
    assert_eq!(h.available("FL1").await, 5);

    let cancelled = h.publisher.published_on(TOPIC_BOOKING_CANCELLED).await;
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].key, pnr.as_str());
    assert_eq!(cancelled[0].payload["airlineName"], "IndiGo");
}

#[tokio::test]
async fn test_second_cancel_is_a_conflict_regardless_of_time() {
    let h = TestHarness::new().await;
    let pnr = h.book(&["9A"]).await;
    h.orchestrator.cancel_booking(&pnr).await.unwrap();

    let err = h.orchestrator.cancel_booking(&pnr).await.unwrap_err();
    assert_eq!(err.to_string(), "Booking already cancelled");
    assert_eq!(err.kind(), ErrorKind::Conflict);

    h.clock.advance(Duration::days(3));
    let err = h.orchestrator.cancel_booking(&pnr).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert_eq!(h.inventory.release_calls().await.len(), 1);
}

#[tokio::test]
async fn test_cancel_just_inside_the_window() {
    let h = TestHarness::new().await;
    let pnr = h.book(&["10A"]).await;

    h.clock.advance(Duration::hours(23) + Duration::minutes(59) + Duration::seconds(59));
    let view = h.orchestrator.cancel_booking(&pnr).await.unwrap();
    assert_eq!(view.status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_at_window_boundary_fails_and_keeps_booking() {
    let h = TestHarness::new().await;
    let pnr = h.book(&["11A"]).await;

    h.clock.advance(Duration::hours(24));
    let err = h.orchestrator.cancel_booking(&pnr).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "Cancellation allowed only within 24 hours of booking"
    );
    assert_eq!(err.kind(), ErrorKind::Validation);
    let stored = h.bookings.find_by_pnr(&pnr).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Booked);
    assert!(h.inventory.release_calls().await.is_empty());
}

#[tokio::test]
async fn test_cancel_unknown_pnr() {
    let h = TestHarness::new().await;

    let err = h
        .orchestrator
        .cancel_booking(&Pnr::new("PNR-NOPE0000"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid PNR: PNR-NOPE0000");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_release_failure_keeps_booking_cancelled() {
    let h = TestHarness::new().await;
    let pnr = h.book(&["12A"]).await;
    h.inventory.set_fail_on_release(true).await;

    let err = h.orchestrator.cancel_booking(&pnr).await.unwrap_err();

    assert!(err
        .to_string()
        .starts_with("Booking cancelled locally but releasing seats failed: "));
    assert_eq!(err.kind(), ErrorKind::Business);
    let stored = h.bookings.find_by_pnr(&pnr).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Cancelled);
    assert!(h.publisher.published_on(TOPIC_BOOKING_CANCELLED).await.is_empty());
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_get_booking_enriches_with_flight_details() {
    let h = TestHarness::new().await;
    let pnr = h.book(&["13A", "13B"]).await;

    let view = h.orchestrator.get_booking(&pnr).await.unwrap();
    assert_eq!(view.pnr, pnr);
    assert_eq!(view.destination.as_deref(), Some("BOM"));
    assert_eq!(view.passengers.len(), 2);
}

#[tokio::test]
async fn test_history_is_newest_first() {
    let h = TestHarness::new().await;
    let first = h.book(&["14A"]).await;
    h.clock.advance(Duration::minutes(5));
    let second = h.book(&["14B"]).await;

    let history = h
        .orchestrator
        .booking_history("booker@example.com")
        .await
        .unwrap();
    let pnrs: Vec<_> = history.iter().map(|v| v.pnr.clone()).collect();
    assert_eq!(pnrs, vec![second, first]);
}

#[tokio::test]
async fn test_empty_history_is_not_found() {
    let h = TestHarness::new().await;

    let err = h
        .orchestrator
        .booking_history("nobody@example.com")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No bookings found for email: nobody@example.com");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ---------------------------------------------------------------------------
// Circuit breaker
// ---------------------------------------------------------------------------

fn tight_breaker() -> CircuitBreakerConfig {
    CircuitBreakerConfig::builder()
        .failure_rate_threshold(0.5)
        .window_size(4)
        .minimum_calls(4)
        .open_duration(StdDuration::from_secs(30))
        .half_open_probes(1)
        .build()
}

#[tokio::test]
async fn test_outage_opens_breaker_and_short_circuits() {
    let h = TestHarness::with_breaker(tight_breaker()).await;
    h.inventory.set_unavailable(true).await;

    for _ in 0..4 {
        let _ = h.orchestrator.create_booking(request("FL1", &["1A"])).await;
    }
    assert_eq!(h.orchestrator.breaker().state().await, State::Open);

    let calls_before = h.inventory.snapshot_calls().await;
    let err = h
        .orchestrator
        .create_booking(request("FL1", &["1A"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(h.inventory.snapshot_calls().await, calls_before);
}

#[tokio::test]
async fn test_domain_errors_do_not_open_breaker() {
    let h = TestHarness::with_breaker(tight_breaker()).await;

    for _ in 0..6 {
        let err = h
            .orchestrator
            .create_booking(request("FL404", &["1A"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
    assert_eq!(h.orchestrator.breaker().state().await, State::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_breaker_recovers_after_open_duration() {
    let h = TestHarness::with_breaker(tight_breaker()).await;
    h.inventory.set_unavailable(true).await;
    for _ in 0..4 {
        let _ = h.orchestrator.create_booking(request("FL1", &["1A"])).await;
    }
    assert_eq!(h.orchestrator.breaker().state().await, State::Open);

    h.inventory.set_unavailable(false).await;
    tokio::time::advance(StdDuration::from_secs(31)).await;

    let view = h
        .orchestrator
        .create_booking(request("FL1", &["1A"]))
        .await
        .unwrap();
    assert_eq!(view.status, BookingStatus::Booked);
    assert_eq!(h.orchestrator.breaker().state().await, State::Closed);
}

// ---------------------------------------------------------------------------
// Sagas on their own task
// ---------------------------------------------------------------------------

/// Booking store whose writes take `delay` before reaching the inner store.
#[derive(Clone)]
struct SlowBookingStore {
    inner: InMemoryBookingStore,
    delay: StdDuration,
}

#[async_trait]
impl BookingStore for SlowBookingStore {
    async fn save(&self, booking: &Booking) -> store::Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.save(booking).await
    }

    async fn find_by_pnr(&self, pnr: &Pnr) -> store::Result<Option<Booking>> {
        self.inner.find_by_pnr(pnr).await
    }

    async fn find_by_booker_email_order_by_date_desc(
        &self,
        email: &str,
    ) -> store::Result<Vec<Booking>> {
        self.inner.find_by_booker_email_order_by_date_desc(email).await
    }

    async fn delete_by_pnr(&self, pnr: &Pnr) -> store::Result<()> {
        self.inner.delete_by_pnr(pnr).await
    }
}

type SlowOrchestrator = BookingOrchestrator<
    SlowBookingStore,
    InMemoryPassengerStore,
    InMemoryInventoryClient,
    InMemoryEventPublisher,
>;

struct SlowSetup {
    orchestrator: Arc<SlowOrchestrator>,
    bookings: InMemoryBookingStore,
    passengers: InMemoryPassengerStore,
    inventory: InMemoryInventoryClient,
}

async fn slow_setup() -> SlowSetup {
    let bookings = InMemoryBookingStore::new();
    let passengers = InMemoryPassengerStore::new();
    let inventory = InMemoryInventoryClient::new();
    inventory.add_flight(flight("FL1", 5)).await;

    let orchestrator = BookingOrchestrator::new(
        SlowBookingStore {
            inner: bookings.clone(),
            delay: StdDuration::from_secs(1),
        },
        passengers.clone(),
        inventory.clone(),
        CircuitBreaker::new("inventory", CircuitBreakerConfig::default()),
        InMemoryEventPublisher::new(),
    );

    SlowSetup {
        orchestrator: Arc::new(orchestrator),
        bookings,
        passengers,
        inventory,
    }
}

#[tokio::test(start_paused = true)]
async fn test_caller_leaving_after_reserve_still_compensates() {
    let s = slow_setup().await;
    s.passengers.set_fail_on_save_all(true).await;

    let waited = tokio::time::timeout(
        StdDuration::from_millis(50),
        s.orchestrator
            .clone()
            .spawn_create_booking(request("FL1", &["1A"])),
    )
    .await;
    assert!(waited.is_err());
    assert_eq!(s.inventory.reserve_calls().await.len(), 1);

    tokio::time::sleep(StdDuration::from_secs(2)).await;

    assert_eq!(s.inventory.release_calls().await.len(), 1);
    assert_eq!(
        s.inventory.available_seats(&FlightId::new("FL1")).await,
        Some(5)
    );
    assert_eq!(s.bookings.booking_count().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_caller_leaving_after_reserve_still_stores_booking() {
    let s = slow_setup().await;

    let waited = tokio::time::timeout(
        StdDuration::from_millis(50),
        s.orchestrator
            .clone()
            .spawn_create_booking(request("FL1", &["1A", "1B"])),
    )
    .await;
    assert!(waited.is_err());

    tokio::time::sleep(StdDuration::from_secs(2)).await;

    assert_eq!(s.bookings.booking_count().await, 1);
    assert_eq!(s.passengers.passenger_count().await, 2);
    assert!(s.inventory.release_calls().await.is_empty());
    assert_eq!(
        s.inventory.available_seats(&FlightId::new("FL1")).await,
        Some(3)
    );
}

#[tokio::test(start_paused = true)]
async fn test_spawned_sagas_return_results() {
    let s = slow_setup().await;
    let view = s
        .orchestrator
        .clone()
        .spawn_create_booking(request("FL1", &["2A"]))
        .await
        .unwrap();

    let cancelled = s
        .orchestrator
        .clone()
        .spawn_cancel_booking(view.pnr.clone())
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    let err = s
        .orchestrator
        .clone()
        .spawn_cancel_booking(view.pnr)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}
