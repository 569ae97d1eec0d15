use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{feed::ReceivedReading, AppState, Mode, RelayState};

// ---

#[derive(Serialize)]
struct LocalStatus {
    percentage: f64,
    plugged: bool,
    /// `"charging"`, `"unknown"` or a countdown such as `"1h 20m"`.
    time_left: String,
    seconds_remaining: i64,
    health: Option<f64>,
}

#[derive(Serialize)]
struct BatteryResponse {
    status: Option<LocalStatus>,
    active_source: String,
    /// Percentage the controller acts on; null when unavailable.
    percentage: Option<f64>,
    device: Option<ReceivedReading>,
    mode: Mode,
    relay: RelayState,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/battery", get(handler))
}

async fn handler(State(app): State<AppState>) -> Json<BatteryResponse> {
    // ---
    let host = app.registry.host();
    let status = host.read().map(|b| LocalStatus {
        percentage: b.percentage,
        plugged: b.plugged_in,
        time_left: b.time_left().to_string(),
        seconds_remaining: b.seconds_remaining,
        health: host.health_percent(),
    });

    Json(BatteryResponse {
        status,
        active_source: app.registry.active().await.to_string(),
        percentage: app.registry.resolve_active().await.ok(),
        device: app.feed.latest().await,
        mode: app.controller.mode().await,
        relay: app.controller.relay().await,
    })
}
