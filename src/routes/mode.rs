use axum::{extract::rejection::JsonRejection, extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::json_body;
use crate::{AppState, ControlError, Mode, RelayState};

// ---

#[derive(Serialize)]
struct ModeResponse {
    mode: Mode,
    relay: RelayState,
}

#[derive(Debug, Deserialize)]
struct ModeRequest {
    mode: String,
}

#[derive(Serialize)]
struct ModeSwitchResponse {
    success: bool,
    mode: Mode,
    previous: Mode,
    link_ok: bool,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/mode", get(get_mode).post(set_mode))
}

async fn get_mode(State(app): State<AppState>) -> Json<ModeResponse> {
    Json(ModeResponse {
        mode: app.controller.mode().await,
        relay: app.controller.relay().await,
    })
}

async fn set_mode(
    State(app): State<AppState>,
    payload: Result<Json<ModeRequest>, JsonRejection>,
) -> Result<Json<ModeSwitchResponse>, ControlError> {
    // ---
    let request = json_body(payload)?;
    let mode: Mode = request.mode.parse()?;
    info!("POST /api/mode - {}", mode);

    let switch = app.controller.set_mode(mode).await;
    Ok(Json(ModeSwitchResponse {
        success: true,
        mode: switch.mode,
        previous: switch.previous,
        link_ok: switch.link_ok,
    }))
}
