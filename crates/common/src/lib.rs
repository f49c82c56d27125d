//! Identifiers shared by the booking crates.

mod types;

pub use types::{BookingReference, FlightId, Pnr};
