//! Inventory client wrapped in the circuit breaker and the fallback policy.

use common::FlightId;
use domain::FlightSnapshot;

use crate::circuit_breaker::CircuitBreaker;
use crate::error::Result;
use crate::fallback::{GuardedOutcome, is_breaker_failure, resolve};
use crate::services::{InventoryClient, ReservationRequest, ReservationResult};

/// The only path from the sagas to the inventory authority.
///
/// All three operations share one breaker.
pub struct GuardedInventory<I: InventoryClient> {
    client: I,
    breaker: CircuitBreaker,
}

impl<I: InventoryClient> GuardedInventory<I> {
    pub fn new(client: I, breaker: CircuitBreaker) -> Self {
        Self { client, breaker }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub async fn snapshot(&self, flight_id: &FlightId) -> Result<FlightSnapshot> {
        let outcome: GuardedOutcome<_> = self
            .breaker
            .call(|| self.client.snapshot(flight_id), is_breaker_failure)
            .await
            .into();
        resolve(outcome, "snapshot")
    }

    pub async fn reserve(
        &self,
        flight_id: &FlightId,
        request: &ReservationRequest,
    ) -> Result<ReservationResult> {
        let outcome: GuardedOutcome<_> = self
            .breaker
            .call(|| self.client.reserve(flight_id, request), is_breaker_failure)
            .await
            .into();
        resolve(outcome, "reserve")
    }

    pub async fn release(&self, flight_id: &FlightId, request: &ReservationRequest) -> Result<()> {
        let outcome: GuardedOutcome<_> = self
            .breaker
            .call(|| self.client.release(flight_id, request), is_breaker_failure)
            .await
            .into();
        resolve(outcome, "release")
    }
}
