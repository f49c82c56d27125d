//! Fallback policy for guarded inventory calls.
//!
//! Every guarded call ends in a [`GuardedOutcome`]. [`resolve`] turns it into
//! the caller-visible result: business answers from the authority are passed
//! through with their own message, and anything else becomes
//! [`BookingError::Unavailable`].

use crate::circuit_breaker::CircuitBreakerError;
use crate::error::BookingError;
use crate::services::InventoryError;

/// How an inventory error is treated by the breaker and the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A business answer. Reaches the caller unchanged and does not count
    /// as a breaker failure.
    Domain,
    /// The authority is unhealthy. Counts as a breaker failure and is
    /// replaced by the generic unavailable error.
    Infrastructure,
}

/// Classifies an inventory error.
pub fn classify(err: &InventoryError) -> ErrorClass {
    match err {
        InventoryError::FlightNotFound(_) | InventoryError::Rejected(_) => ErrorClass::Domain,
        InventoryError::Timeout
        | InventoryError::Transport(_)
        | InventoryError::UnexpectedStatus { .. }
        | InventoryError::Decode(_) => ErrorClass::Infrastructure,
    }
}

/// Predicate handed to the circuit breaker.
pub fn is_breaker_failure(err: &InventoryError) -> bool {
    classify(err) == ErrorClass::Infrastructure
}

/// Result of one guarded call.
#[derive(Debug)]
pub enum GuardedOutcome<T> {
    Ok(T),
    /// The breaker did not admit the call.
    BreakerOpen,
    /// The call reached the authority and failed.
    RemoteError(InventoryError),
}

impl<T> From<Result<T, CircuitBreakerError<InventoryError>>> for GuardedOutcome<T> {
    fn from(result: Result<T, CircuitBreakerError<InventoryError>>) -> Self {
        match result {
            Ok(value) => GuardedOutcome::Ok(value),
            Err(CircuitBreakerError::Open) => GuardedOutcome::BreakerOpen,
            Err(CircuitBreakerError::Inner(err)) => GuardedOutcome::RemoteError(err),
        }
    }
}

/// Maps a guarded outcome to the caller-visible result. `operation` only
/// labels the log line.
pub fn resolve<T>(outcome: GuardedOutcome<T>, operation: &'static str) -> Result<T, BookingError> {
    match outcome {
        GuardedOutcome::Ok(value) => Ok(value),
        GuardedOutcome::BreakerOpen => {
            tracing::warn!(operation, "inventory call short-circuited by open breaker");
            metrics::counter!("inventory_fallbacks_total", "operation" => operation, "cause" => "breaker_open")
                .increment(1);
            Err(BookingError::Unavailable)
        }
        GuardedOutcome::RemoteError(err) => match classify(&err) {
            ErrorClass::Domain => Err(domain_error(err)),
            ErrorClass::Infrastructure => {
                tracing::warn!(operation, error = %err, "inventory call failed");
                metrics::counter!("inventory_fallbacks_total", "operation" => operation, "cause" => "remote_error")
                    .increment(1);
                Err(BookingError::Unavailable)
            }
        },
    }
}

fn domain_error(err: InventoryError) -> BookingError {
    match err {
        InventoryError::FlightNotFound(flight_id) => BookingError::FlightNotFound(flight_id),
        other => BookingError::InventoryRejected(other.to_string()),
    }
}
