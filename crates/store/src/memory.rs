use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{FlightId, Pnr};
use domain::{Booking, Passenger};
use tokio::sync::RwLock;

use crate::{BookingStore, PassengerStore, Result, StoreError};

#[derive(Debug, Default)]
struct BookingState {
    bookings: HashMap<Pnr, Booking>,
    fail_on_save: bool,
    save_calls: usize,
}

/// In-memory booking store for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBookingStore {
    state: Arc<RwLock<BookingState>>,
}

impl InMemoryBookingStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `save` fail until reset.
    pub async fn set_fail_on_save(&self, fail: bool) {
        self.state.write().await.fail_on_save = fail;
    }

    /// Returns the number of stored bookings.
    pub async fn booking_count(&self) -> usize {
        self.state.read().await.bookings.len()
    }

    /// Returns how many times `save` was called, failed calls included.
    pub async fn save_calls(&self) -> usize {
        self.state.read().await.save_calls
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn save(&self, booking: &Booking) -> Result<()> {
        let mut state = self.state.write().await;
        state.save_calls += 1;

        if state.fail_on_save {
            return Err(StoreError::Unavailable("booking write rejected".to_string()));
        }

        state.bookings.insert(booking.pnr.clone(), booking.clone());
        Ok(())
    }

    async fn find_by_pnr(&self, pnr: &Pnr) -> Result<Option<Booking>> {
        Ok(self.state.read().await.bookings.get(pnr).cloned())
    }

    async fn find_by_booker_email_order_by_date_desc(&self, email: &str) -> Result<Vec<Booking>> {
        let state = self.state.read().await;
        let mut bookings: Vec<_> = state
            .bookings
            .values()
            .filter(|b| b.booker_email == email)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| {
            b.booking_date_time
                .cmp(&a.booking_date_time)
                .then_with(|| a.pnr.cmp(&b.pnr))
        });
        Ok(bookings)
    }

    async fn delete_by_pnr(&self, pnr: &Pnr) -> Result<()> {
        self.state.write().await.bookings.remove(pnr);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PassengerState {
    passengers: Vec<Passenger>,
    fail_on_save_all: bool,
}

/// In-memory passenger store for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPassengerStore {
    state: Arc<RwLock<PassengerState>>,
}

impl InMemoryPassengerStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `save_all` fail until reset.
    pub async fn set_fail_on_save_all(&self, fail: bool) {
        self.state.write().await.fail_on_save_all = fail;
    }

    /// Returns the number of stored passengers.
    pub async fn passenger_count(&self) -> usize {
        self.state.read().await.passengers.len()
    }
}

#[async_trait]
impl PassengerStore for InMemoryPassengerStore {
    async fn save_all(&self, passengers: &[Passenger]) -> Result<()> {
        let mut state = self.state.write().await;

        if state.fail_on_save_all {
            return Err(StoreError::Unavailable(
                "passenger batch write rejected".to_string(),
            ));
        }

        state.passengers.extend_from_slice(passengers);
        Ok(())
    }

    async fn find_by_flight_and_seats_in(
        &self,
        flight_id: &FlightId,
        seats: &[String],
    ) -> Result<Vec<Passenger>> {
        if seats.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.state.read().await;
        Ok(state
            .passengers
            .iter()
            .filter(|p| &p.flight_id == flight_id && seats.contains(&p.seat_no))
            .cloned()
            .collect())
    }

    async fn find_by_pnr(&self, pnr: &Pnr) -> Result<Vec<Passenger>> {
        let state = self.state.read().await;
        Ok(state
            .passengers
            .iter()
            .filter(|p| &p.pnr == pnr)
            .cloned()
            .collect())
    }

    async fn count_by_pnr(&self, pnr: &Pnr) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state.passengers.iter().filter(|p| &p.pnr == pnr).count() as u64)
    }
}
