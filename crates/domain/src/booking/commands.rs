//! Booking commands.

use std::collections::HashSet;

use common::{FlightId, Pnr};
use serde::{Deserialize, Serialize};

use super::{BookingRuleError, Gender, MealType, Passenger, TripType, normalize_seat};

/// Oldest passenger age accepted in a booking request.
pub const MAX_PASSENGER_AGE: u32 = 150;

/// Details of one traveller in a create-booking request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerDetails {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub seat_no: String,
    pub meal_type: MealType,
}

impl PassengerDetails {
    /// Creates passenger details.
    pub fn new(
        name: impl Into<String>,
        age: u32,
        gender: Gender,
        seat_no: impl Into<String>,
        meal_type: MealType,
    ) -> Self {
        Self {
            name: name.into(),
            age,
            gender,
            seat_no: seat_no.into(),
            meal_type,
        }
    }
}

/// Command to book seats on a flight for a group of passengers.
#[derive(Debug, Clone)]
pub struct CreateBooking {
    /// The flight to book.
    pub flight_id: FlightId,

    /// E-mail of the person making the booking.
    pub booker_email: String,

    /// Journey type.
    pub trip_type: TripType,

    /// Travellers, one seat each.
    pub passengers: Vec<PassengerDetails>,
}

impl CreateBooking {
    /// Creates a new CreateBooking command.
    pub fn new(
        flight_id: impl Into<FlightId>,
        booker_email: impl Into<String>,
        trip_type: TripType,
        passengers: Vec<PassengerDetails>,
    ) -> Self {
        Self {
            flight_id: flight_id.into(),
            booker_email: booker_email.into(),
            trip_type,
            passengers,
        }
    }

    /// Validates the request shape before any collaborator is called.
    pub fn validate(&self) -> Result<(), BookingRuleError> {
        let email = self.booker_email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(BookingRuleError::InvalidRequest(format!(
                "Invalid booker email: '{}'",
                self.booker_email
            )));
        }

        if self.passengers.is_empty() {
            return Err(BookingRuleError::InvalidRequest(
                "At least one passenger is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for passenger in &self.passengers {
            if passenger.name.trim().is_empty() {
                return Err(BookingRuleError::InvalidRequest(
                    "Passenger name must not be empty".to_string(),
                ));
            }

            if passenger.age > MAX_PASSENGER_AGE {
                return Err(BookingRuleError::InvalidRequest(format!(
                    "Invalid age {} for passenger '{}'",
                    passenger.age, passenger.name
                )));
            }

            let seat = normalize_seat(&passenger.seat_no).ok_or_else(|| {
                BookingRuleError::InvalidRequest(format!(
                    "Seat number is required for passenger '{}'",
                    passenger.name
                ))
            })?;

            if !seen.insert(seat.clone()) {
                return Err(BookingRuleError::InvalidRequest(format!(
                    "Seat {seat} requested more than once"
                )));
            }
        }

        Ok(())
    }

    /// Number of seats this request needs.
    pub fn passenger_count(&self) -> u32 {
        self.passengers.len() as u32
    }

    /// Normalized seat numbers in passenger order.
    pub fn seat_numbers(&self) -> Vec<String> {
        self.passengers
            .iter()
            .filter_map(|p| normalize_seat(&p.seat_no))
            .collect()
    }

    /// Builds the passenger rows stored under `pnr`.
    pub fn passengers_for(&self, pnr: &Pnr) -> Vec<Passenger> {
        self.passengers
            .iter()
            .map(|p| Passenger {
                name: p.name.trim().to_string(),
                age: p.age,
                gender: p.gender,
                seat_no: normalize_seat(&p.seat_no).unwrap_or_default(),
                meal_type: p.meal_type,
                flight_id: self.flight_id.clone(),
                pnr: pnr.clone(),
            })
            .collect()
    }
}
