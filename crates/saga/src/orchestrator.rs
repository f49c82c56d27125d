//! Booking orchestrator: create and cancel sagas plus booking queries.

use std::collections::HashMap;
use std::sync::Arc;

use common::{BookingReference, FlightId, Pnr};
use domain::{Booking, CreateBooking, DEFAULT_CANCELLATION_WINDOW_HOURS, FlightSnapshot};
use store::{BookingStore, PassengerStore};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::circuit_breaker::CircuitBreaker;
use crate::clock::{Clock, SystemClock};
use crate::compensation::{self, Committed};
use crate::error::{BookingError, Result};
use crate::events::{BookingCancelledData, BookingCreatedData, BookingEvent};
use crate::guarded::GuardedInventory;
use crate::seat_conflict::SeatConflictChecker;
use crate::services::{EventPublisher, InventoryClient, ReservationRequest};
use crate::state::CreateBookingStep;
use crate::view::BookingView;

/// Tunables of the booking rules.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How long after creation a booking may be cancelled.
    pub cancellation_window: chrono::Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cancellation_window: chrono::Duration::hours(DEFAULT_CANCELLATION_WINDOW_HOURS),
        }
    }
}

/// Drives the booking sagas across the inventory authority and the two
/// local stores.
///
/// Every inventory call goes through one shared circuit breaker. There are
/// no retries: a failed step either needs no undo or is compensated before
/// the error is returned.
pub struct BookingOrchestrator<B, P, I, E>
where
    B: BookingStore,
    P: PassengerStore,
    I: InventoryClient,
    E: EventPublisher,
{
    bookings: B,
    passengers: P,
    inventory: GuardedInventory<I>,
    publisher: E,
    clock: Arc<dyn Clock>,
    config: OrchestratorConfig,
}

impl<B, P, I, E> BookingOrchestrator<B, P, I, E>
where
    B: BookingStore,
    P: PassengerStore,
    I: InventoryClient,
    E: EventPublisher,
{
    /// Creates an orchestrator using the system clock and default rules.
    pub fn new(bookings: B, passengers: P, inventory: I, breaker: CircuitBreaker, publisher: E) -> Self {
        Self {
            bookings,
            passengers,
            inventory: GuardedInventory::new(inventory, breaker),
            publisher,
            clock: Arc::new(SystemClock),
            config: OrchestratorConfig::default(),
        }
    }

    /// Replaces the time source.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Replaces the booking rules.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// The breaker shared by all inventory calls.
    pub fn breaker(&self) -> &CircuitBreaker {
        self.inventory.breaker()
    }

    /// Books seats on a flight for every passenger in `command`.
    ///
    /// On success the seats are reserved with the inventory authority and
    /// the booking and its passengers are stored. On failure after the
    /// reservation, the seats are released before the error is returned.
    #[tracing::instrument(
        skip(self, command),
        fields(flight_id = %command.flight_id, passengers = command.passengers.len())
    )]
    pub async fn create_booking(&self, command: CreateBooking) -> Result<BookingView> {
        let saga_start = std::time::Instant::now();
        let result = self.run_create(&command).await;

        metrics::histogram!("booking_saga_duration_seconds", "saga" => "create")
            .record(saga_start.elapsed().as_secs_f64());
        match &result {
            Ok(view) => {
                metrics::counter!("booking_created_total").increment(1);
                tracing::info!(pnr = %view.pnr, "booking created");
            }
            Err(e) => {
                metrics::counter!("booking_failures_total", "saga" => "create", "kind" => e.kind().as_str())
                    .increment(1);
                tracing::info!(error = %e, "booking not created");
            }
        }
        result
    }

    async fn run_create(&self, command: &CreateBooking) -> Result<BookingView> {
        command.validate()?;

        let mut step = CreateBookingStep::Init;
        let mut committed = Committed::default();
        let flight_id = &command.flight_id;

        let flight = self.inventory.snapshot(flight_id).await?;
        advance(&mut step, CreateBookingStep::SnapshotFetched);

        let requested = command.passenger_count();
        if !flight.has_capacity_for(requested) {
            return Err(BookingError::NotEnoughSeats {
                requested,
                available: flight.available_seats,
            });
        }
        advance(&mut step, CreateBookingStep::CapacityOk);

        let seats = command.seat_numbers();
        SeatConflictChecker::new(&self.passengers)
            .check(flight_id, &seats)
            .await?;
        advance(&mut step, CreateBookingStep::SeatsClear);

        let request = ReservationRequest::new(BookingReference::generate(), seats);
        let reservation = self.inventory.reserve(flight_id, &request).await?;
        if !reservation.success {
            return Err(BookingError::ReservationRejected(reservation.message));
        }
        committed.reservation = Some((flight_id.clone(), request));
        advance(&mut step, CreateBookingStep::SeatsReserved);

        let booking = Booking::new(
            Pnr::generate(),
            flight_id.clone(),
            command.booker_email.trim(),
            command.trip_type,
            requested,
            flight.price,
            self.clock.now(),
        );
        if let Err(e) = self.bookings.save(&booking).await {
            return Err(self.compensate(step, &committed, "booking", e.to_string()).await);
        }
        committed.booking = Some(booking.pnr.clone());
        advance(&mut step, CreateBookingStep::BookingSaved);

        let passengers = command.passengers_for(&booking.pnr);
        if let Err(e) = self.passengers.save_all(&passengers).await {
            return Err(self
                .compensate(step, &committed, "passengers", e.to_string())
                .await);
        }
        advance(&mut step, CreateBookingStep::PassengersSaved);

        let view = BookingView::new(&booking, &passengers, Some(&flight));

        self.publish(BookingEvent::BookingCreated(BookingCreatedData {
            pnr: booking.pnr.clone(),
            booker_email: booking.booker_email.clone(),
            flight_id: booking.flight_id.clone(),
            airline_name: flight.airline_name.clone(),
            seats_booked: booking.seats_booked,
            total_amount: booking.total_amount.as_major(),
            booking_date_time: booking.booking_date_time,
        }))
        .await;
        advance(&mut step, CreateBookingStep::EventPublished);

        Ok(view)
    }

    /// Runs the compensation plan for a failed save and builds the error
    /// returned to the caller.
    async fn compensate(
        &self,
        last_completed: CreateBookingStep,
        committed: &Committed,
        failed: &'static str,
        cause: String,
    ) -> BookingError {
        let plan = compensation::plan(last_completed, committed);
        metrics::counter!("booking_compensations_total", "failed_step" => failed).increment(1);
        tracing::warn!(
            step = %last_completed,
            failed,
            cause = %cause,
            "booking saga failed after reservation, compensating"
        );

        let mut release_failure = None;
        if let Some((flight_id, request)) = &plan.release {
            match self.inventory.release(flight_id, request).await {
                Ok(()) => tracing::info!(
                    reference = %request.booking_reference,
                    count = request.count,
                    "reserved seats released"
                ),
                Err(e) => {
                    tracing::error!(
                        reference = %request.booking_reference,
                        error = %e,
                        "release-seat compensation failed"
                    );
                    metrics::counter!("booking_compensation_failures_total").increment(1);
                    release_failure = Some(e.to_string());
                }
            }
        }

        if let Some(pnr) = &plan.discard_booking {
            if let Err(e) = self.bookings.delete_by_pnr(pnr).await {
                tracing::error!(pnr = %pnr, error = %e, "failed to discard booking without passengers");
            }
        }

        match release_failure {
            Some(compensation) => BookingError::CompensationFailed {
                step: failed,
                cause,
                compensation,
            },
            None => BookingError::SaveFailed {
                step: failed,
                cause,
            },
        }
    }

    /// Cancels a booking and hands its seats back to the inventory authority.
    ///
    /// The booking is marked cancelled locally before the release. If the
    /// release fails the booking stays cancelled and the error says so.
    #[tracing::instrument(skip(self), fields(pnr = %pnr))]
    pub async fn cancel_booking(&self, pnr: &Pnr) -> Result<BookingView> {
        let saga_start = std::time::Instant::now();
        let result = self.run_cancel(pnr).await;

        metrics::histogram!("booking_saga_duration_seconds", "saga" => "cancel")
            .record(saga_start.elapsed().as_secs_f64());
        match &result {
            Ok(_) => {
                metrics::counter!("booking_cancelled_total").increment(1);
                tracing::info!("booking cancelled");
            }
            Err(e) => {
                metrics::counter!("booking_failures_total", "saga" => "cancel", "kind" => e.kind().as_str())
                    .increment(1);
                tracing::info!(error = %e, "booking not cancelled");
            }
        }
        result
    }

    async fn run_cancel(&self, pnr: &Pnr) -> Result<BookingView> {
        let mut booking = self
            .bookings
            .find_by_pnr(pnr)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(pnr.clone()))?;

        let now = self.clock.now();
        booking.cancel(now, self.config.cancellation_window)?;
        self.bookings.save(&booking).await?;
        tracing::info!(step = "cancelled_locally", "cancel saga step completed");

        let passengers = match self.release_seats(&booking).await {
            Ok(passengers) => passengers,
            Err(e) => {
                tracing::error!(error = %e, "booking cancelled but seats were not released");
                return Err(BookingError::ReleaseAfterCancelFailed {
                    pnr: pnr.clone(),
                    reason: e.to_string(),
                });
            }
        };
        tracing::info!(step = "seats_released", "cancel saga step completed");

        let flight = match self.inventory.snapshot(&booking.flight_id).await {
            Ok(flight) => Some(flight),
            Err(e) => {
                tracing::warn!(error = %e, "flight details unavailable after cancellation");
                None
            }
        };

        self.publish(BookingEvent::BookingCancelled(BookingCancelledData {
            pnr: booking.pnr.clone(),
            booker_email: booking.booker_email.clone(),
            flight_id: booking.flight_id.clone(),
            airline_name: flight
                .as_ref()
                .map(|f| f.airline_name.clone())
                .unwrap_or_default(),
            cancelled_at: now,
        }))
        .await;

        Ok(BookingView::new(&booking, &passengers, flight.as_ref()))
    }

    /// Releases the seats of a cancelled booking under its PNR.
    async fn release_seats(&self, booking: &Booking) -> Result<Vec<domain::Passenger>> {
        let count = self.passengers.count_by_pnr(&booking.pnr).await?;
        let passengers = self.passengers.find_by_pnr(&booking.pnr).await?;

        let request = ReservationRequest {
            booking_reference: BookingReference::from(&booking.pnr),
            count: u32::try_from(count).unwrap_or(u32::MAX),
            seat_numbers: passengers.iter().map(|p| p.seat_no.clone()).collect(),
        };
        self.inventory.release(&booking.flight_id, &request).await?;
        Ok(passengers)
    }

    /// Looks a booking up by PNR, with its passengers and flight details.
    #[tracing::instrument(skip(self), fields(pnr = %pnr))]
    pub async fn get_booking(&self, pnr: &Pnr) -> Result<BookingView> {
        let booking = self
            .bookings
            .find_by_pnr(pnr)
            .await?
            .ok_or_else(|| BookingError::BookingNotFound(pnr.clone()))?;

        let passengers = self.passengers.find_by_pnr(pnr).await?;
        let flight = self.inventory.snapshot(&booking.flight_id).await?;
        Ok(BookingView::new(&booking, &passengers, Some(&flight)))
    }

    /// Every booking made by `email`, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn booking_history(&self, email: &str) -> Result<Vec<BookingView>> {
        let bookings = self
            .bookings
            .find_by_booker_email_order_by_date_desc(email)
            .await?;
        if bookings.is_empty() {
            return Err(BookingError::NoBookingHistory(email.to_string()));
        }

        let mut flights: HashMap<FlightId, FlightSnapshot> = HashMap::new();
        let mut views = Vec::with_capacity(bookings.len());
        for booking in &bookings {
            if !flights.contains_key(&booking.flight_id) {
                let flight = self.inventory.snapshot(&booking.flight_id).await?;
                flights.insert(booking.flight_id.clone(), flight);
            }

            let passengers = self.passengers.find_by_pnr(&booking.pnr).await?;
            views.push(BookingView::new(
                booking,
                &passengers,
                flights.get(&booking.flight_id),
            ));
        }
        Ok(views)
    }

    /// Best-effort publication. Failures are logged and never reach the caller.
    async fn publish(&self, event: BookingEvent) {
        let topic = event.topic();
        let payload = match event.payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(topic, error = %e, "failed to serialize booking event");
                return;
            }
        };

        match self
            .publisher
            .publish(topic, event.key().as_str(), payload)
            .await
        {
            Ok(()) => tracing::debug!(topic, event_type = event.event_type(), "booking event published"),
            Err(e) => {
                metrics::counter!("booking_event_publish_failures_total", "topic" => topic)
                    .increment(1);
                tracing::warn!(topic, pnr = %event.key(), error = %e, "failed to publish booking event");
            }
        }
    }
}

impl<B, P, I, E> BookingOrchestrator<B, P, I, E>
where
    B: BookingStore + 'static,
    P: PassengerStore + 'static,
    I: InventoryClient + 'static,
    E: EventPublisher + 'static,
{
    /// Runs [`create_booking`](Self::create_booking) on its own task.
    ///
    /// Dropping the returned future only stops waiting for the result. A saga
    /// that reached the reservation still stores the booking or releases the
    /// seats.
    pub async fn spawn_create_booking(
        self: Arc<Self>,
        command: CreateBooking,
    ) -> Result<BookingView> {
        let task =
            tokio::spawn(async move { self.create_booking(command).await }.in_current_span());
        join_saga(task).await
    }

    /// Runs [`cancel_booking`](Self::cancel_booking) on its own task.
    ///
    /// Once started, the local cancellation and the seat release complete
    /// even if the returned future is dropped.
    pub async fn spawn_cancel_booking(self: Arc<Self>, pnr: Pnr) -> Result<BookingView> {
        let task =
            tokio::spawn(async move { self.cancel_booking(&pnr).await }.in_current_span());
        join_saga(task).await
    }
}

async fn join_saga<T>(task: JoinHandle<Result<T>>) -> Result<T> {
    match task.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => {
            tracing::error!(error = %e, "booking saga task cancelled");
            Err(BookingError::Interrupted)
        }
    }
}

fn advance(step: &mut CreateBookingStep, to: CreateBookingStep) {
    *step = to;
    tracing::info!(
        step = %to,
        committed = to.is_committed(),
        "create saga step completed"
    );
}
