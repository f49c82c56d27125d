//! Booking notifications drained from the event queue.
//!
//! Stands in for e-mail delivery: each message is rendered into the
//! notification the booker would receive and logged.

use saga::events::{BookingCancelledData, BookingCreatedData};
use saga::{PublishedMessage, TOPIC_BOOKING_CANCELLED, TOPIC_BOOKING_CREATED};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A rendered notification for one booker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Unknown notification topic: {0}")]
    UnknownTopic(String),

    #[error("Malformed notification payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Renders the notification for a published message.
pub fn render(message: &PublishedMessage) -> Result<Notification, NotifierError> {
    match message.topic.as_str() {
        TOPIC_BOOKING_CREATED => {
            let data: BookingCreatedData = serde_json::from_value(message.payload.clone())?;
            Ok(Notification {
                to: data.booker_email,
                subject: format!("Booking confirmed: {}", data.pnr),
                body: format!(
                    "Your booking {} on {} flight {} is confirmed for {} seat(s). Total paid: {:.2}.",
                    data.pnr, data.airline_name, data.flight_id, data.seats_booked, data.total_amount
                ),
            })
        }
        TOPIC_BOOKING_CANCELLED => {
            let data: BookingCancelledData = serde_json::from_value(message.payload.clone())?;
            Ok(Notification {
                to: data.booker_email,
                subject: format!("Booking cancelled: {}", data.pnr),
                body: format!(
                    "Your booking {} on {} flight {} was cancelled at {}.",
                    data.pnr,
                    data.airline_name,
                    data.flight_id,
                    data.cancelled_at.to_rfc3339()
                ),
            })
        }
        other => Err(NotifierError::UnknownTopic(other.to_string())),
    }
}

/// Spawns the task draining `receiver` until every sender is dropped.
///
/// The task resolves to the number of notifications sent.
pub fn spawn(mut receiver: mpsc::Receiver<PublishedMessage>) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut sent = 0;
        while let Some(message) = receiver.recv().await {
            match render(&message) {
                Ok(notification) => {
                    sent += 1;
                    metrics::counter!("booking_notifications_sent_total", "topic" => message.topic.clone())
                        .increment(1);
                    tracing::info!(
                        to = %notification.to,
                        subject = %notification.subject,
                        key = %message.key,
                        "notification sent"
                    );
                }
                Err(e) => {
                    tracing::warn!(topic = %message.topic, key = %message.key, error = %e, "notification dropped");
                }
            }
        }
        tracing::info!(sent, "notifier stopped");
        sent
    })
}
