//! Local advisory check for seats already held on a flight.

use std::collections::HashSet;

use common::FlightId;
use domain::normalize_seats;
use store::PassengerStore;

use crate::error::{BookingError, Result};

/// Checks requested seats against passengers stored for the same flight.
///
/// Passengers of cancelled bookings still hold their seats. The check is not
/// atomic with the later inserts: two concurrent sagas can both pass it.
pub struct SeatConflictChecker<'a, P: PassengerStore + ?Sized> {
    passengers: &'a P,
}

impl<'a, P: PassengerStore + ?Sized> SeatConflictChecker<'a, P> {
    pub fn new(passengers: &'a P) -> Self {
        Self { passengers }
    }

    /// Returns the requested seats already held on `flight_id`, each once,
    /// in request order. Seats are normalized first; blank ones are ignored.
    pub async fn taken_seats(&self, flight_id: &FlightId, seats: &[String]) -> Result<Vec<String>> {
        let requested = normalize_seats(seats.iter().map(String::as_str));
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let held: HashSet<String> = self
            .passengers
            .find_by_flight_and_seats_in(flight_id, &requested)
            .await?
            .into_iter()
            .map(|p| p.seat_no)
            .collect();

        let mut seen = HashSet::new();
        Ok(requested
            .into_iter()
            .filter(|seat| held.contains(seat) && seen.insert(seat.clone()))
            .collect())
    }

    /// Fails with [`BookingError::SeatsTaken`] if any requested seat is held.
    pub async fn check(&self, flight_id: &FlightId, seats: &[String]) -> Result<()> {
        let taken = self.taken_seats(flight_id, seats).await?;
        if taken.is_empty() {
            return Ok(());
        }

        tracing::info!(flight_id = %flight_id, taken = ?taken, "requested seats already held");
        Err(BookingError::SeatsTaken(taken))
    }
}
