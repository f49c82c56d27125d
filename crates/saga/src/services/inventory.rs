//! Inventory authority client trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{BookingReference, FlightId};
use domain::FlightSnapshot;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors returned by an inventory authority.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// The authority does not know the flight.
    #[error("Flight not found with id: {0}")]
    FlightNotFound(FlightId),

    /// The authority refused the request with a business message.
    #[error("{0}")]
    Rejected(String),

    /// The call did not complete in time.
    #[error("inventory request timed out")]
    Timeout,

    /// The authority could not be reached.
    #[error("inventory transport error: {0}")]
    Transport(String),

    /// The authority answered with a status the client does not understand.
    #[error("inventory returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("invalid inventory response: {0}")]
    Decode(String),
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body of a reserve or release call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    pub booking_reference: BookingReference,
    pub count: u32,
    pub seat_numbers: Vec<String>,
}

impl ReservationRequest {
    pub fn new(booking_reference: BookingReference, seat_numbers: Vec<String>) -> Self {
        Self {
            booking_reference,
            count: seat_numbers.len() as u32,
            seat_numbers,
        }
    }
}

/// Reply to a reserve call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationResult {
    pub success: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reserved_seats: Vec<String>,
}

impl ReservationResult {
    pub fn accepted(reserved_seats: Vec<String>) -> Self {
        Self {
            success: true,
            message: String::new(),
            reserved_seats,
        }
    }

    pub fn declined(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            reserved_seats: Vec::new(),
        }
    }
}

/// The remote authority over flights and seat counts.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Fetches the current view of a flight.
    async fn snapshot(&self, flight_id: &FlightId) -> Result<FlightSnapshot, InventoryError>;

    /// Decrements availability by `request.count`.
    async fn reserve(
        &self,
        flight_id: &FlightId,
        request: &ReservationRequest,
    ) -> Result<ReservationResult, InventoryError>;

    /// Returns `request.count` seats to availability.
    async fn release(
        &self,
        flight_id: &FlightId,
        request: &ReservationRequest,
    ) -> Result<(), InventoryError>;
}

#[async_trait]
impl<T: InventoryClient + ?Sized> InventoryClient for Arc<T> {
    async fn snapshot(&self, flight_id: &FlightId) -> Result<FlightSnapshot, InventoryError> {
        (**self).snapshot(flight_id).await
    }

    async fn reserve(
        &self,
        flight_id: &FlightId,
        request: &ReservationRequest,
    ) -> Result<ReservationResult, InventoryError> {
        (**self).reserve(flight_id, request).await
    }

    async fn release(
        &self,
        flight_id: &FlightId,
        request: &ReservationRequest,
    ) -> Result<(), InventoryError> {
        (**self).release(flight_id, request).await
    }
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    flights: HashMap<FlightId, FlightSnapshot>,
    released: HashSet<(FlightId, BookingReference)>,
    reserve_calls: Vec<(FlightId, ReservationRequest)>,
    release_calls: Vec<(FlightId, ReservationRequest)>,
    snapshot_calls: usize,
    unavailable: bool,
    fail_on_release: bool,
    decline_reservations: Option<String>,
}

/// In-memory inventory authority for tests and local runs.
///
/// Releases are idempotent per `(flight, booking reference)`: a repeated
/// release with the same reference is accepted but credits nothing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryClient {
    state: Arc<Mutex<InMemoryInventoryState>>,
}

impl InMemoryInventoryClient {
    /// Creates an authority with no flights.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a flight.
    pub async fn add_flight(&self, flight: FlightSnapshot) {
        self.state
            .lock()
            .await
            .flights
            .insert(flight.flight_id.clone(), flight);
    }

    /// Current availability of a flight, if known.
    pub async fn available_seats(&self, flight_id: &FlightId) -> Option<u32> {
        self.state
            .lock()
            .await
            .flights
            .get(flight_id)
            .map(|f| f.available_seats)
    }

    /// Makes every call fail with a transport error until reset.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    /// Makes every release fail with a transport error until reset.
    pub async fn set_fail_on_release(&self, fail: bool) {
        self.state.lock().await.fail_on_release = fail;
    }

    /// Answers reservations with `success = false` and `message` until reset.
    pub async fn set_decline_reservations(&self, message: Option<String>) {
        self.state.lock().await.decline_reservations = message;
    }

    /// Every reserve call received, in order.
    pub async fn reserve_calls(&self) -> Vec<(FlightId, ReservationRequest)> {
        self.state.lock().await.reserve_calls.clone()
    }

    /// Every release call received, in order, failed ones included.
    pub async fn release_calls(&self) -> Vec<(FlightId, ReservationRequest)> {
        self.state.lock().await.release_calls.clone()
    }

    /// Number of snapshot calls received.
    pub async fn snapshot_calls(&self) -> usize {
        self.state.lock().await.snapshot_calls
    }

    fn transport_error() -> InventoryError {
        InventoryError::Transport("connection refused".to_string())
    }
}

#[async_trait]
impl InventoryClient for InMemoryInventoryClient {
    async fn snapshot(&self, flight_id: &FlightId) -> Result<FlightSnapshot, InventoryError> {
        let mut state = self.state.lock().await;
        state.snapshot_calls += 1;

        if state.unavailable {
            return Err(Self::transport_error());
        }

        state
            .flights
            .get(flight_id)
            .cloned()
            .ok_or_else(|| InventoryError::FlightNotFound(flight_id.clone()))
    }

    async fn reserve(
        &self,
        flight_id: &FlightId,
        request: &ReservationRequest,
    ) -> Result<ReservationResult, InventoryError> {
        let mut state = self.state.lock().await;
        state
            .reserve_calls
            .push((flight_id.clone(), request.clone()));

        if state.unavailable {
            return Err(Self::transport_error());
        }
        if let Some(message) = state.decline_reservations.clone() {
            return Ok(ReservationResult::declined(message));
        }

        let flight = state
            .flights
            .get_mut(flight_id)
            .ok_or_else(|| InventoryError::FlightNotFound(flight_id.clone()))?;

        if request.count == 0 {
            return Err(InventoryError::Rejected(format!(
                "Invalid seats count: {}",
                request.count
            )));
        }
        if request.count > flight.available_seats {
            return Ok(ReservationResult::declined(format!(
                "Not enough seats available. Requested: {}, Available: {}",
                request.count, flight.available_seats
            )));
        }

        flight.available_seats -= request.count;
        Ok(ReservationResult::accepted(request.seat_numbers.clone()))
    }

    async fn release(
        &self,
        flight_id: &FlightId,
        request: &ReservationRequest,
    ) -> Result<(), InventoryError> {
        let mut state = self.state.lock().await;
        state
            .release_calls
            .push((flight_id.clone(), request.clone()));

        if state.unavailable || state.fail_on_release {
            return Err(Self::transport_error());
        }

        let key = (flight_id.clone(), request.booking_reference.clone());
        if state.released.contains(&key) {
            return Ok(());
        }

        let flight = state
            .flights
            .get_mut(flight_id)
            .ok_or_else(|| InventoryError::FlightNotFound(flight_id.clone()))?;
        flight.available_seats = flight.available_seats.saturating_add(request.count);
        state.released.insert(key);
        Ok(())
    }
}
