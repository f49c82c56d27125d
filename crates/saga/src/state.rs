//! Progress of a create-booking saga.

use serde::{Deserialize, Serialize};

/// The last step a create-booking saga completed.
///
/// Step transitions:
/// ```text
/// Init ──► SnapshotFetched ──► CapacityOk ──► SeatsClear ──► SeatsReserved
///      ──► BookingSaved ──► PassengersSaved ──► EventPublished
/// ```
///
/// A failure before `SeatsReserved` leaves nothing to undo. A failure after
/// `SeatsReserved` and before `PassengersSaved` must release the seats.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum CreateBookingStep {
    #[default]
    Init,
    SnapshotFetched,
    CapacityOk,
    SeatsClear,
    SeatsReserved,
    BookingSaved,
    PassengersSaved,
    EventPublished,
}

impl CreateBookingStep {
    /// Returns true if a failure right after this step must be compensated.
    pub fn requires_compensation(&self) -> bool {
        matches!(
            self,
            CreateBookingStep::SeatsReserved | CreateBookingStep::BookingSaved
        )
    }

    /// Returns true once the booking is durable and the saga can no longer fail.
    pub fn is_committed(&self) -> bool {
        *self >= CreateBookingStep::PassengersSaved
    }

    /// Returns the step name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CreateBookingStep::Init => "init",
            CreateBookingStep::SnapshotFetched => "snapshot_fetched",
            CreateBookingStep::CapacityOk => "capacity_ok",
            CreateBookingStep::SeatsClear => "seats_clear",
            CreateBookingStep::SeatsReserved => "seats_reserved",
            CreateBookingStep::BookingSaved => "booking_saved",
            CreateBookingStep::PassengersSaved => "passengers_saved",
            CreateBookingStep::EventPublished => "event_published",
        }
    }
}

impl std::fmt::Display for CreateBookingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
