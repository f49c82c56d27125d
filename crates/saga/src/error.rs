//! Booking saga error types.

use common::{FlightId, Pnr};
use domain::BookingRuleError;
use store::StoreError;
use thiserror::Error;

/// Generic text returned whenever the inventory authority cannot be reached.
pub const UNAVAILABLE_MESSAGE: &str =
    "Flight service is temporarily unavailable. Please try again later.";

/// How a [`BookingError`] should be reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or insufficient input. Nothing was changed.
    Validation,
    /// The request conflicts with the booking's current state.
    Conflict,
    /// A business rule or a partially compensated step failed.
    Business,
    /// The booking, flight, or history does not exist.
    NotFound,
    /// The inventory authority is unreachable or the breaker is open.
    Unavailable,
    /// A local store could not be read or written before anything remote
    /// was committed.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Business => "business",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Errors surfaced by the booking sagas and queries.
#[derive(Debug, Error)]
pub enum BookingError {
    /// The request failed validation.
    #[error("{0}")]
    InvalidRequest(String),

    /// More passengers than seats left on the flight.
    #[error("Not enough seats available")]
    NotEnoughSeats { requested: u32, available: u32 },

    /// Requested seat numbers are already held on this flight.
    #[error("Seat(s) already taken: {}", .0.join(", "))]
    SeatsTaken(Vec<String>),

    /// The inventory authority does not know the flight.
    #[error("Flight not found with id: {0}")]
    FlightNotFound(FlightId),

    /// The inventory authority answered a reservation with `success = false`.
    #[error("Seat reservation failed: {0}")]
    ReservationRejected(String),

    /// The inventory authority refused a request with a business message.
    #[error("{0}")]
    InventoryRejected(String),

    /// No booking exists under this PNR.
    #[error("Invalid PNR: {0}")]
    BookingNotFound(Pnr),

    /// The booker has no bookings.
    #[error("No bookings found for email: {0}")]
    NoBookingHistory(String),

    /// The booking is already cancelled.
    #[error("Booking already cancelled")]
    AlreadyCancelled,

    /// The cancellation window has passed.
    #[error("Cancellation allowed only within {window_hours} hours of booking")]
    CancellationWindowExpired { window_hours: i64 },

    /// A ledger write after the reservation failed; the seats were released.
    #[error("Failed to save {step}: {cause}")]
    SaveFailed { step: &'static str, cause: String },

    /// A ledger write after the reservation failed and so did the release.
    #[error("Failed to save {step}: {cause}; release-seat compensation failed: {compensation}")]
    CompensationFailed {
        step: &'static str,
        cause: String,
        compensation: String,
    },

    /// The booking was cancelled locally but the seats were not released.
    #[error("Booking cancelled locally but releasing seats failed: {reason}")]
    ReleaseAfterCancelFailed { pnr: Pnr, reason: String },

    /// The inventory authority is unavailable. The cause is logged, not shown.
    #[error("{}", UNAVAILABLE_MESSAGE)]
    Unavailable,

    /// The task running the saga was cancelled before it finished.
    #[error("Booking saga was interrupted")]
    Interrupted,

    /// A store error before any remote side effect.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Returns the reporting category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::InvalidRequest(_)
            | BookingError::NotEnoughSeats { .. }
            | BookingError::CancellationWindowExpired { .. } => ErrorKind::Validation,
            BookingError::AlreadyCancelled => ErrorKind::Conflict,
            BookingError::SeatsTaken(_)
            | BookingError::ReservationRejected(_)
            | BookingError::InventoryRejected(_)
            | BookingError::SaveFailed { .. }
            | BookingError::CompensationFailed { .. }
            | BookingError::ReleaseAfterCancelFailed { .. } => ErrorKind::Business,
            BookingError::FlightNotFound(_)
            | BookingError::BookingNotFound(_)
            | BookingError::NoBookingHistory(_) => ErrorKind::NotFound,
            BookingError::Unavailable => ErrorKind::Unavailable,
            BookingError::Store(_) | BookingError::Interrupted => ErrorKind::Internal,
        }
    }
}

impl From<BookingRuleError> for BookingError {
    fn from(err: BookingRuleError) -> Self {
        match err {
            BookingRuleError::InvalidRequest(msg) => BookingError::InvalidRequest(msg),
            BookingRuleError::AlreadyCancelled => BookingError::AlreadyCancelled,
            BookingRuleError::CancellationWindowExpired { window_hours } => {
                BookingError::CancellationWindowExpired { window_hours }
            }
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, BookingError>;
