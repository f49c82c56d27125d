//! Booking ledger persistence.
//!
//! Two independent stores, one per aggregate, each with an in-memory and a
//! PostgreSQL implementation. The stores share no transaction with each other
//! or with the inventory authority.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryBookingStore, InMemoryPassengerStore};
pub use postgres::{PostgresBookingStore, PostgresPassengerStore, run_migrations};
pub use store::{BookingStore, PassengerStore};
