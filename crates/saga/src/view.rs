//! Read models returned by the orchestrator.

use chrono::{DateTime, Utc};
use common::{FlightId, Pnr};
use domain::{Booking, BookingStatus, FlightSnapshot, Gender, MealType, Passenger, TripType};
use serde::{Deserialize, Serialize};

/// A traveller as shown to the booker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassengerView {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    pub seat_no: String,
    pub meal_type: MealType,
}

impl From<&Passenger> for PassengerView {
    fn from(p: &Passenger) -> Self {
        Self {
            name: p.name.clone(),
            age: p.age,
            gender: p.gender,
            seat_no: p.seat_no.clone(),
            meal_type: p.meal_type,
        }
    }
}

/// A booking enriched with flight details and its passengers.
///
/// The booking reference used with the inventory authority is not part of
/// this view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingView {
    pub pnr: Pnr,
    pub booker_email: String,
    pub status: BookingStatus,
    /// Total in major currency units.
    pub total_amount: f64,
    pub booking_date_time: DateTime<Utc>,
    pub flight_id: FlightId,
    pub trip_type: TripType,
    pub airline_name: Option<String>,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub passengers: Vec<PassengerView>,
}

impl BookingView {
    /// Builds the view. `flight` is `None` when the flight details could not
    /// be fetched.
    pub fn new(booking: &Booking, passengers: &[Passenger], flight: Option<&FlightSnapshot>) -> Self {
        Self {
            pnr: booking.pnr.clone(),
            booker_email: booking.booker_email.clone(),
            status: booking.status,
            total_amount: booking.total_amount.as_major(),
            booking_date_time: booking.booking_date_time,
            flight_id: booking.flight_id.clone(),
            trip_type: booking.trip_type,
            airline_name: flight.map(|f| f.airline_name.clone()),
            source: flight.map(|f| f.source.clone()),
            destination: flight.map(|f| f.destination.clone()),
            passengers: passengers.iter().map(PassengerView::from).collect(),
        }
    }
}
