// src/routes/health.rs
//! Liveness endpoint for the charger service.
//!
//! Sibling module in the `routes` directory following the Explicit Module
//! Boundary Pattern (EMBP): the handler stays private and the gateway
//! (`mod.rs`) merges the exported subrouter.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{AppState, Mode};

/// JSON response body for the `/health` endpoint.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    mode: Mode,
    serial_connected: bool,
}

/// Handle `GET /health`.
///
/// Reports the process as up even when the serial link is down; the link
/// state is included so a supervisor can tell the two apart.
async fn health(State(app): State<AppState>) -> Json<HealthResponse> {
    // ---
    Json(HealthResponse {
        status: "ok",
        mode: app.controller.mode().await,
        serial_connected: app.link.is_connected().await,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
