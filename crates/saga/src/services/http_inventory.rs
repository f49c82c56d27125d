//! HTTP client for a remote inventory authority.
//!
//! Routes, relative to the configured base URL:
//!
//! | Operation | Request                        |
//! |-----------|--------------------------------|
//! | snapshot  | `GET  /flights/{id}`           |
//! | reserve   | `POST /flights/{id}/reserve`   |
//! | release   | `POST /flights/{id}/release`   |

use std::time::Duration;

use async_trait::async_trait;
use common::FlightId;
use domain::{FlightSnapshot, Money};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;

use super::inventory::{InventoryClient, InventoryError, ReservationRequest, ReservationResult};

/// Flight as serialized by the authority. Extra fields are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlightBody {
    #[serde(default)]
    flight_id: Option<String>,
    #[serde(default)]
    airline_name: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    destination: Option<String>,
    available_seats: i64,
    price: f64,
}

impl FlightBody {
    fn into_snapshot(self, requested: &FlightId) -> FlightSnapshot {
        FlightSnapshot {
            flight_id: self
                .flight_id
                .map(FlightId::new)
                .unwrap_or_else(|| requested.clone()),
            available_seats: u32::try_from(self.available_seats.max(0)).unwrap_or(u32::MAX),
            price: Money::from_major(self.price),
            source: self.source.unwrap_or_default(),
            destination: self.destination.unwrap_or_default(),
            airline_name: self.airline_name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Inventory authority reached over HTTP with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpInventoryClient {
    client: Client,
    base_url: Url,
}

impl HttpInventoryClient {
    /// Creates a client for the authority at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, InventoryError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| InventoryError::Transport(format!("invalid base url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(InventoryError::Transport(format!(
                "invalid base url: {base_url}"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InventoryError::Transport(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    fn flight_url(&self, flight_id: &FlightId, action: Option<&str>) -> Result<Url, InventoryError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| InventoryError::Transport("invalid base url".to_string()))?;
            segments.pop_if_empty().push("flights").push(flight_id.as_str());
            if let Some(action) = action {
                segments.push(action);
            }
        }
        Ok(url)
    }

    async fn check_status(
        response: Response,
        flight_id: &FlightId,
    ) -> Result<Response, InventoryError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, body, flight_id))
    }
}

/// Maps a non-success answer to an error.
///
/// Only statuses that judge the request itself are business rejections.
/// Throttling, auth and timeouts say nothing about the booking and count
/// against the breaker like a 5xx.
fn status_error(status: StatusCode, body: String, flight_id: &FlightId) -> InventoryError {
    match status {
        StatusCode::NOT_FOUND => InventoryError::FlightNotFound(flight_id.clone()),
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or(body);
            InventoryError::Rejected(message)
        }
        _ => InventoryError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        },
    }
}

fn transport_error(err: reqwest::Error) -> InventoryError {
    if err.is_timeout() {
        InventoryError::Timeout
    } else if err.is_decode() {
        InventoryError::Decode(err.to_string())
    } else {
        InventoryError::Transport(err.to_string())
    }
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    #[tracing::instrument(skip(self))]
    async fn snapshot(&self, flight_id: &FlightId) -> Result<FlightSnapshot, InventoryError> {
        let url = self.flight_url(flight_id, None)?;
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        let response = Self::check_status(response, flight_id).await?;

        let body: FlightBody = response.json().await.map_err(transport_error)?;
        Ok(body.into_snapshot(flight_id))
    }

    #[tracing::instrument(skip(self, request), fields(reference = %request.booking_reference, count = request.count))]
    async fn reserve(
        &self,
        flight_id: &FlightId,
        request: &ReservationRequest,
    ) -> Result<ReservationResult, InventoryError> {
        let url = self.flight_url(flight_id, Some("reserve"))?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        let response = Self::check_status(response, flight_id).await?;

        response.json().await.map_err(transport_error)
    }

    #[tracing::instrument(skip(self, request), fields(reference = %request.booking_reference, count = request.count))]
    async fn release(
        &self,
        flight_id: &FlightId,
        request: &ReservationRequest,
    ) -> Result<(), InventoryError> {
        let url = self.flight_url(flight_id, Some("release"))?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check_status(response, flight_id).await?;
        Ok(())
    }
}
