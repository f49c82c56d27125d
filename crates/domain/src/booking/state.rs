//! Booking status state machine.

use serde::{Deserialize, Serialize};

/// The status of a booking in its lifecycle.
///
/// State transitions:
/// ```text
/// Booked ──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Seats are reserved and the booking is active.
    #[default]
    Booked,

    /// Booking was cancelled (terminal state).
    Cancelled,
}

impl BookingStatus {
    /// Returns true if the booking can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, BookingStatus::Booked)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled)
    }

    /// Returns the status name as stored and sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Booked => "BOOKED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }

    /// Parses a stored status name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "BOOKED" => Some(BookingStatus::Booked),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
