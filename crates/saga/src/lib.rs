//! Booking sagas over a remote seat inventory.
//!
//! Two sagas share one orchestrator:
//!
//! - **create**: snapshot the flight, check capacity and seats, reserve with
//!   the inventory authority, then store the booking and its passengers.
//!   A failed store write after the reservation releases the seats again.
//! - **cancel**: mark the booking cancelled within the cancellation window,
//!   then release its seats under the PNR.
//!
//! Every inventory call goes through a shared circuit breaker and a fallback
//! policy that hides infrastructure failures behind one generic error.

pub mod circuit_breaker;
pub mod clock;
pub mod compensation;
pub mod error;
pub mod events;
pub mod fallback;
pub mod guarded;
pub mod orchestrator;
pub mod seat_conflict;
pub mod services;
pub mod state;
pub mod view;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{BookingError, ErrorKind, Result, UNAVAILABLE_MESSAGE};
pub use events::{BookingEvent, TOPIC_BOOKING_CANCELLED, TOPIC_BOOKING_CREATED};
pub use orchestrator::{BookingOrchestrator, OrchestratorConfig};
pub use services::{
    ChannelEventPublisher, EventPublisher, HttpInventoryClient, InMemoryEventPublisher,
    InMemoryInventoryClient, InventoryClient, InventoryError, PublishedMessage,
    ReservationRequest, ReservationResult,
};
pub use state::CreateBookingStep;
pub use view::{BookingView, PassengerView};
