//! Read-only view of a flight as reported by the inventory authority.

use common::FlightId;
use serde::{Deserialize, Serialize};

use crate::booking::Money;

/// Flight and seat availability, fetched per call and never stored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSnapshot {
    pub flight_id: FlightId,
    pub available_seats: u32,
    /// Price of a single seat.
    pub price: Money,
    pub source: String,
    pub destination: String,
    pub airline_name: String,
}

impl FlightSnapshot {
    /// Returns true if `count` seats fit into the current availability.
    pub fn has_capacity_for(&self, count: u32) -> bool {
        count <= self.available_seats
    }
}
