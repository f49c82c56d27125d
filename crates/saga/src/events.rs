//! Booking notifications.

use chrono::{DateTime, Utc};
use common::{FlightId, Pnr};
use serde::{Deserialize, Serialize};

/// Topic of [`BookingEvent::BookingCreated`].
pub const TOPIC_BOOKING_CREATED: &str = "booking-created";
/// Topic of [`BookingEvent::BookingCancelled`].
pub const TOPIC_BOOKING_CANCELLED: &str = "booking-cancelled";

/// Notifications emitted after a saga completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BookingEvent {
    BookingCreated(BookingCreatedData),
    BookingCancelled(BookingCancelledData),
}

impl BookingEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            BookingEvent::BookingCreated(_) => "BookingCreated",
            BookingEvent::BookingCancelled(_) => "BookingCancelled",
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            BookingEvent::BookingCreated(_) => TOPIC_BOOKING_CREATED,
            BookingEvent::BookingCancelled(_) => TOPIC_BOOKING_CANCELLED,
        }
    }

    /// Partition key: the booking's PNR.
    pub fn key(&self) -> &Pnr {
        match self {
            BookingEvent::BookingCreated(data) => &data.pnr,
            BookingEvent::BookingCancelled(data) => &data.pnr,
        }
    }

    /// The message body, without the type envelope.
    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            BookingEvent::BookingCreated(data) => serde_json::to_value(data),
            BookingEvent::BookingCancelled(data) => serde_json::to_value(data),
        }
    }
}

/// Payload published on `booking-created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCreatedData {
    pub pnr: Pnr,
    pub booker_email: String,
    pub flight_id: FlightId,
    pub airline_name: String,
    pub seats_booked: u32,
    /// Total in major currency units.
    pub total_amount: f64,
    pub booking_date_time: DateTime<Utc>,
}

/// Payload published on `booking-cancelled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingCancelledData {
    pub pnr: Pnr,
    pub booker_email: String,
    pub flight_id: FlightId,
    pub airline_name: String,
    pub cancelled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created() -> BookingEvent {
        BookingEvent::BookingCreated(BookingCreatedData {
            pnr: Pnr::new("PNR-1A2B3C4D"),
            booker_email: "a@b.io".to_string(),
            flight_id: FlightId::new("FL1"),
            airline_name: "IndiGo".to_string(),
            seats_booked: 2,
            total_amount: 200.0,
            booking_date_time: Utc::now(),
        })
    }

    #[test]
    fn test_routing() {
        let event = created();
        assert_eq!(event.event_type(), "BookingCreated");
        assert_eq!(event.topic(), "booking-created");
        assert_eq!(event.key().as_str(), "PNR-1A2B3C4D");
    }

    #[test]
    fn test_payload_is_camel_case_without_envelope() {
        let payload = created().payload().unwrap();
        assert_eq!(payload["pnr"], "PNR-1A2B3C4D");
        assert_eq!(payload["bookerEmail"], "a@b.io");
        assert_eq!(payload["seatsBooked"], 2);
        assert!(payload.get("type").is_none());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let event = created();
        let json = serde_json::to_string(&event).unwrap();
        let back: BookingEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
