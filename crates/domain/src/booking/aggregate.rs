//! Booking and passenger records.

use chrono::{DateTime, Duration, Utc};
use common::{FlightId, Pnr};
use serde::{Deserialize, Serialize};

use super::{BookingRuleError, BookingStatus, Gender, MealType, Money, TripType};

/// Hours after creation during which a booking may still be cancelled.
pub const DEFAULT_CANCELLATION_WINDOW_HOURS: i64 = 24;

/// A reservation record owned by the booking store.
///
/// Created once by the create-booking saga and mutated at most once, when
/// [`Booking::cancel`] moves it from `Booked` to `Cancelled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub pnr: Pnr,
    pub flight_id: FlightId,
    pub booker_email: String,
    pub status: BookingStatus,
    pub trip_type: TripType,
    /// Creation timestamp, never changed after the booking is saved.
    pub booking_date_time: DateTime<Utc>,
    pub seats_booked: u32,
    pub total_amount: Money,
}

impl Booking {
    /// Creates a new `Booked` booking priced at `unit_price` per seat.
    pub fn new(
        pnr: Pnr,
        flight_id: FlightId,
        booker_email: impl Into<String>,
        trip_type: TripType,
        seats_booked: u32,
        unit_price: Money,
        booked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            pnr,
            flight_id,
            booker_email: booker_email.into(),
            status: BookingStatus::Booked,
            trip_type,
            booking_date_time: booked_at,
            seats_booked,
            total_amount: unit_price.multiply(seats_booked),
        }
    }

    /// Checks that the booking may be cancelled at `now`.
    ///
    /// An already cancelled booking is rejected before the window is looked
    /// at. The window is half-open: any elapsed time strictly below `window`
    /// is accepted, `window` itself is not.
    pub fn ensure_cancellable(
        &self,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<(), BookingRuleError> {
        if !self.status.can_cancel() {
            return Err(BookingRuleError::AlreadyCancelled);
        }

        let elapsed = now - self.booking_date_time;
        if elapsed >= window {
            return Err(BookingRuleError::CancellationWindowExpired {
                window_hours: window.num_hours(),
            });
        }

        Ok(())
    }

    /// Moves the booking to `Cancelled` after checking the rules.
    pub fn cancel(&mut self, now: DateTime<Utc>, window: Duration) -> Result<(), BookingRuleError> {
        self.ensure_cancellable(now, window)?;
        self.status = BookingStatus::Cancelled;
        Ok(())
    }
}

/// A traveller on a booking. Never mutated after the batch save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passenger {
    pub name: String,
    pub age: u32,
    pub gender: Gender,
    /// Normalized seat number (trimmed, uppercase).
    pub seat_no: String,
    pub meal_type: MealType,
    pub flight_id: FlightId,
    /// Back-reference to the owning booking.
    pub pnr: Pnr,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking_at(booked_at: DateTime<Utc>) -> Booking {
        Booking::new(
            Pnr::new("PNR-TEST0001"),
            FlightId::new("FL1"),
            "booker@example.com",
            TripType::OneWay,
            2,
            Money::from_cents(4500),
            booked_at,
        )
    }

    fn window() -> Duration {
        Duration::hours(DEFAULT_CANCELLATION_WINDOW_HOURS)
    }

    #[test]
    fn test_new_booking_is_booked_and_priced() {
        let booking = booking_at(Utc::now());
        assert_eq!(booking.status, BookingStatus::Booked);
        assert_eq!(booking.total_amount.cents(), 9000);
        assert_eq!(booking.seats_booked, 2);
    }

    #[test]
    fn test_cancel_just_inside_window() {
        let now = Utc::now();
        let mut booking = booking_at(now - Duration::seconds(23 * 3600 + 59 * 60 + 59));
        booking.cancel(now, window()).unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_cancel_at_window_boundary_fails() {
        let now = Utc::now();
        let mut booking = booking_at(now - Duration::hours(24));
        let err = booking.cancel(now, window()).unwrap_err();
        assert!(matches!(
            err,
            BookingRuleError::CancellationWindowExpired { window_hours: 24 }
        ));
        assert_eq!(booking.status, BookingStatus::Booked);
    }

    #[test]
    fn test_cancel_twice_is_rejected_regardless_of_time() {
        let now = Utc::now();
        let mut booking = booking_at(now - Duration::days(30));
        booking.status = BookingStatus::Cancelled;

        let err = booking.cancel(now, window()).unwrap_err();
        assert!(matches!(err, BookingRuleError::AlreadyCancelled));

        let mut fresh = booking_at(now);
        fresh.cancel(now, window()).unwrap();
        let err = fresh.cancel(now, window()).unwrap_err();
        assert!(matches!(err, BookingRuleError::AlreadyCancelled));
    }

    #[test]
    fn test_booking_serialization_roundtrip() {
        let booking = booking_at(Utc::now());
        let json = serde_json::to_string(&booking).unwrap();
        let back: Booking = serde_json::from_str(&json).unwrap();
        assert_eq!(booking, back);
    }
}
