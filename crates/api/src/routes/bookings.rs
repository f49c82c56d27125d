//! Booking, cancellation and lookup endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{FlightId, Pnr};
use domain::{CreateBooking, PassengerDetails, TripType};
use saga::{BookingOrchestrator, BookingView, EventPublisher, InventoryClient};
use serde::{Deserialize, Serialize};
use store::{BookingStore, PassengerStore};

use crate::error::ApiError;

/// Orchestrator over collaborators chosen at startup.
pub type Orchestrator = BookingOrchestrator<
    Arc<dyn BookingStore>,
    Arc<dyn PassengerStore>,
    Arc<dyn InventoryClient>,
    Arc<dyn EventPublisher>,
>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub booker_email: String,
    #[serde(default)]
    pub trip_type: TripType,
    pub passengers: Vec<PassengerDetails>,
}

// -- Response types --

#[derive(Serialize)]
pub struct CancelResponse {
    pub message: &'static str,
    pub booking: BookingView,
}

// -- Handlers --

/// POST /booking/{flight_id} — book one seat per passenger.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(flight_id): Path<String>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingView>), ApiError> {
    let command = CreateBooking::new(
        FlightId::new(flight_id),
        req.booker_email,
        req.trip_type,
        req.passengers,
    );
    // A client disconnect drops this handler, not the saga.
    let view = state
        .orchestrator
        .clone()
        .spawn_create_booking(command)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /booking/{pnr} — booking with passengers and flight details.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(pnr): Path<String>,
) -> Result<Json<BookingView>, ApiError> {
    let pnr = parse_pnr(&pnr)?;
    let view = state.orchestrator.get_booking(&pnr).await?;
    Ok(Json(view))
}

/// GET /booking/history/{email} — the booker's bookings, newest first.
#[tracing::instrument(skip(state))]
pub async fn history(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<Vec<BookingView>>, ApiError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ApiError::BadRequest("Booker email is required".to_string()));
    }
    let views = state.orchestrator.booking_history(email).await?;
    Ok(Json(views))
}

/// DELETE /booking/cancel/{pnr} — cancel within the window and free the seats.
#[tracing::instrument(skip(state))]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Path(pnr): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let pnr = parse_pnr(&pnr)?;
    let booking = state.orchestrator.clone().spawn_cancel_booking(pnr).await?;
    Ok(Json(CancelResponse {
        message: "Booking cancelled successfully",
        booking,
    }))
}

fn parse_pnr(raw: &str) -> Result<Pnr, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::BadRequest("PNR is required".to_string()));
    }
    Ok(Pnr::new(raw))
}
