//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use super::bookings::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// State of the breaker guarding the inventory authority.
    pub inventory_circuit: &'static str,
}

/// GET /health — reports liveness and the inventory breaker state.
///
/// An open breaker does not make the service unhealthy. Every endpoint that
/// needs the inventory authority, lookups included, fails fast with 503
/// until the breaker closes.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let circuit = state.orchestrator.breaker().state().await;
    Json(HealthResponse {
        status: "ok",
        inventory_circuit: circuit.as_str(),
    })
}
