use std::sync::Arc;

use async_trait::async_trait;
use common::{FlightId, Pnr};
use domain::{Booking, Passenger};

use crate::Result;

/// Persistence for the Booking aggregate.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Inserts the booking, or overwrites the row with the same PNR.
    async fn save(&self, booking: &Booking) -> Result<()>;

    /// Looks a booking up by PNR.
    async fn find_by_pnr(&self, pnr: &Pnr) -> Result<Option<Booking>>;

    /// Returns every booking made by `email`, newest first.
    async fn find_by_booker_email_order_by_date_desc(&self, email: &str) -> Result<Vec<Booking>>;

    /// Removes a booking row. Used only to undo a booking whose passengers
    /// were never stored.
    async fn delete_by_pnr(&self, pnr: &Pnr) -> Result<()>;
}

/// Persistence for passengers.
#[async_trait]
pub trait PassengerStore: Send + Sync {
    /// Stores all passengers atomically: either every row is written or none.
    async fn save_all(&self, passengers: &[Passenger]) -> Result<()>;

    /// Passengers on `flight_id` holding any of `seats` (exact match on the
    /// normalized seat number).
    async fn find_by_flight_and_seats_in(
        &self,
        flight_id: &FlightId,
        seats: &[String],
    ) -> Result<Vec<Passenger>>;

    /// Passengers of a booking, in insertion order.
    async fn find_by_pnr(&self, pnr: &Pnr) -> Result<Vec<Passenger>>;

    /// Number of passengers on a booking.
    async fn count_by_pnr(&self, pnr: &Pnr) -> Result<u64>;
}

#[async_trait]
impl<T: BookingStore + ?Sized> BookingStore for Arc<T> {
    async fn save(&self, booking: &Booking) -> Result<()> {
        (**self).save(booking).await
    }

    async fn find_by_pnr(&self, pnr: &Pnr) -> Result<Option<Booking>> {
        (**self).find_by_pnr(pnr).await
    }

    async fn find_by_booker_email_order_by_date_desc(&self, email: &str) -> Result<Vec<Booking>> {
        (**self).find_by_booker_email_order_by_date_desc(email).await
    }

    async fn delete_by_pnr(&self, pnr: &Pnr) -> Result<()> {
        (**self).delete_by_pnr(pnr).await
    }
}

#[async_trait]
impl<T: PassengerStore + ?Sized> PassengerStore for Arc<T> {
    async fn save_all(&self, passengers: &[Passenger]) -> Result<()> {
        (**self).save_all(passengers).await
    }

    async fn find_by_flight_and_seats_in(
        &self,
        flight_id: &FlightId,
        seats: &[String],
    ) -> Result<Vec<Passenger>> {
        (**self).find_by_flight_and_seats_in(flight_id, seats).await
    }

    async fn find_by_pnr(&self, pnr: &Pnr) -> Result<Vec<Passenger>> {
        (**self).find_by_pnr(pnr).await
    }

    async fn count_by_pnr(&self, pnr: &Pnr) -> Result<u64> {
        (**self).count_by_pnr(pnr).await
    }
}
