//! Booking aggregate and related types.

mod aggregate;
mod commands;
mod state;
mod value_objects;

pub use aggregate::{Booking, DEFAULT_CANCELLATION_WINDOW_HOURS, Passenger};
pub use commands::{CreateBooking, MAX_PASSENGER_AGE, PassengerDetails};
pub use state::BookingStatus;
pub use value_objects::{Gender, MealType, Money, TripType, normalize_seat, normalize_seats};

use thiserror::Error;

/// Business rules a booking request or booking record can violate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingRuleError {
    /// The request is malformed.
    #[error("{0}")]
    InvalidRequest(String),

    /// The booking was already cancelled.
    #[error("Booking already cancelled")]
    AlreadyCancelled,

    /// The cancellation window has passed.
    #[error("Cancellation allowed only within {window_hours} hours of booking")]
    CancellationWindowExpired { window_hours: i64 },
}
