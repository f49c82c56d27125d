//! Integration tests for the booking rules.
//!
//! These tests drive a booking from request to cancellation through the
//! public API only.

use chrono::{Duration, TimeZone, Utc};
use common::{FlightId, Pnr};
use domain::{
    Booking, BookingRuleError, BookingStatus, CreateBooking, DEFAULT_CANCELLATION_WINDOW_HOURS,
    Gender, MealType, Money, PassengerDetails, TripType,
};

fn window() -> Duration {
    Duration::hours(DEFAULT_CANCELLATION_WINDOW_HOURS)
}

fn family_request() -> CreateBooking {
    CreateBooking::new(
        "FL1",
        "parent@example.com",
        TripType::RoundTrip,
        vec![
            PassengerDetails::new("Asha", 41, Gender::Female, " 12a", MealType::Veg),
            PassengerDetails::new("Ravi", 43, Gender::Male, "12B ", MealType::NonVeg),
            PassengerDetails::new("Mira", 9, Gender::Female, "12c", MealType::Veg),
        ],
    )
}

mod request_to_booking {
    use super::*;

    #[test]
    fn valid_request_produces_consistent_rows() {
        let cmd = family_request();
        cmd.validate().unwrap();

        let pnr = Pnr::generate();
        let booked_at = Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap();
        let booking = Booking::new(
            pnr.clone(),
            cmd.flight_id.clone(),
            cmd.booker_email.clone(),
            cmd.trip_type,
            cmd.passenger_count(),
            Money::from_major(3999.5),
            booked_at,
        );
        let passengers = cmd.passengers_for(&pnr);

        assert_eq!(booking.status, BookingStatus::Booked);
        assert_eq!(booking.seats_booked, 3);
        assert_eq!(booking.total_amount, Money::from_cents(1_199_850));
        assert_eq!(passengers.len(), booking.seats_booked as usize);
        assert!(passengers.iter().all(|p| p.pnr == pnr));
        assert!(passengers.iter().all(|p| p.flight_id == FlightId::new("FL1")));
        assert_eq!(cmd.seat_numbers(), vec!["12A", "12B", "12C"]);
    }

    #[test]
    fn duplicate_seat_after_normalization_is_rejected() {
        let mut cmd = family_request();
        cmd.passengers[2].seat_no = "12A".to_string();

        let err = cmd.validate().unwrap_err();
        assert!(matches!(err, BookingRuleError::InvalidRequest(_)));
        assert_eq!(err.to_string(), "Seat 12A requested more than once");
    }
}

mod cancellation {
    use super::*;

    fn booking(booked_at: chrono::DateTime<Utc>) -> Booking {
        Booking::new(
            Pnr::new("PNR-CANCEL01"),
            FlightId::new("FL1"),
            "parent@example.com",
            TripType::OneWay,
            1,
            Money::from_cents(10_000),
            booked_at,
        )
    }

    #[test]
    fn cancel_within_window_then_again_is_already_cancelled() {
        let booked_at = Utc::now();
        let mut b = booking(booked_at);

        b.cancel(booked_at + Duration::hours(1), window()).unwrap();
        assert_eq!(b.status, BookingStatus::Cancelled);

        let err = b.cancel(booked_at + Duration::hours(2), window()).unwrap_err();
        assert_eq!(err, BookingRuleError::AlreadyCancelled);
    }

    #[test]
    fn already_cancelled_wins_over_expired_window() {
        let booked_at = Utc::now();
        let mut b = booking(booked_at);
        b.cancel(booked_at, window()).unwrap();

        let err = b.cancel(booked_at + Duration::days(10), window()).unwrap_err();
        assert_eq!(err, BookingRuleError::AlreadyCancelled);
    }

    #[test]
    fn expired_window_leaves_booking_untouched() {
        let booked_at = Utc::now();
        let mut b = booking(booked_at);

        let err = b.cancel(booked_at + Duration::hours(30), window()).unwrap_err();
        assert_eq!(
            err,
            BookingRuleError::CancellationWindowExpired { window_hours: 24 }
        );
        assert_eq!(b.status, BookingStatus::Booked);
    }

    #[test]
    fn custom_window_is_respected() {
        let booked_at = Utc::now();
        let b = booking(booked_at);

        assert!(b
            .ensure_cancellable(booked_at + Duration::hours(47), Duration::hours(48))
            .is_ok());
        assert!(b
            .ensure_cancellable(booked_at + Duration::hours(48), Duration::hours(48))
            .is_err());
    }
}
