//! Compensation planning for a failed create-booking saga.

use common::{FlightId, Pnr};

use crate::services::ReservationRequest;
use crate::state::CreateBookingStep;

/// Side effects a saga has committed so far.
#[derive(Debug, Clone, Default)]
pub struct Committed {
    /// The accepted reservation and its flight.
    pub reservation: Option<(FlightId, ReservationRequest)>,
    /// PNR of the saved booking row.
    pub booking: Option<Pnr>,
}

/// Undo actions for a failed saga.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompensationPlan {
    /// Seats to hand back, under the reservation's own reference.
    pub release: Option<(FlightId, ReservationRequest)>,
    /// Booking row left without passengers.
    pub discard_booking: Option<Pnr>,
}

/// Decides what to undo when the step after `last_completed` failed.
///
/// At most one release is planned. Nothing is planned before the
/// reservation or once passengers are stored.
pub fn plan(last_completed: CreateBookingStep, committed: &Committed) -> CompensationPlan {
    if !last_completed.requires_compensation() {
        return CompensationPlan::default();
    }

    CompensationPlan {
        release: committed.reservation.clone(),
        discard_booking: if last_completed >= CreateBookingStep::BookingSaved {
            committed.booking.clone()
        } else {
            None
        },
    }
}
