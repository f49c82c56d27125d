//! Domain layer for the flight booking system.
//!
//! This crate provides the booking ledger's core types:
//! - Booking and Passenger records with the cancellation rules
//! - CreateBooking command with request validation
//! - FlightSnapshot, the read-only view of the inventory authority

pub mod booking;
pub mod flight;

pub use booking::{
    Booking, BookingRuleError, BookingStatus, CreateBooking, DEFAULT_CANCELLATION_WINDOW_HOURS,
    Gender, MAX_PASSENGER_AGE, MealType, Money, Passenger, PassengerDetails, TripType,
    normalize_seat, normalize_seats,
};
pub use flight::FlightSnapshot;
