//! Manual command passthrough.
//!
//! Sends one command line to the charger, waits briefly, and returns whatever
//! the device replied. Telemetry lines are routed to the device feed and never
//! show up in the reply.

use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::json_body;
use crate::{AppState, ControlError, EventKind};

// ---

#[derive(Debug, Deserialize)]
struct CommandRequest {
    command: String,
}

#[derive(Debug, Deserialize)]
struct SsrRequest {
    state: String,
}

#[derive(Serialize)]
struct CommandResponse {
    success: bool,
    command: String,
    responses: Vec<String>,
}

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/command", post(command))
        .route("/api/ssr", post(ssr))
}

/// Trim and upper-case a command; it must be a single non-empty line.
fn normalize_command(raw: &str) -> Result<String, ControlError> {
    // ---
    let cmd = raw.trim();
    if cmd.is_empty() {
        return Err(ControlError::validation("command must not be empty"));
    }
    if cmd.contains(|c| c == '\n' || c == '\r') {
        return Err(ControlError::validation("command must be a single line"));
    }
    Ok(cmd.to_ascii_uppercase())
}

async fn command(
    State(app): State<AppState>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandResponse>, ControlError> {
    // ---
    let req = json_body(payload)?;
    let cmd = normalize_command(&req.command)?;
    passthrough(&app, cmd).await
}

async fn ssr(
    State(app): State<AppState>,
    payload: Result<Json<SsrRequest>, JsonRejection>,
) -> Result<Json<CommandResponse>, ControlError> {
    // ---
    let req = json_body(payload)?;
    let cmd = match req.state.trim().to_ascii_lowercase().as_str() {
        "on" => "ON",
        "off" => "OFF",
        other => {
            return Err(ControlError::validation(format!(
                "invalid relay state '{other}', expected on or off"
            )));
        }
    };
    passthrough(&app, cmd.to_string()).await
}

async fn passthrough(app: &AppState, cmd: String) -> Result<Json<CommandResponse>, ControlError> {
    // ---
    let responses = match app.feed.exchange(&cmd, app.response_wait).await {
        Ok(responses) => responses,
        Err(e) => {
            app.events
                .record(EventKind::Error, "command", format!("{cmd} failed: {e}"))
                .await;
            return Err(e.into());
        }
    };
    info!("POST manual command - {} ({} replies)", cmd, responses.len());

    app.events
        .record(EventKind::Info, "command", format!("manual {cmd}"))
        .await;

    Ok(Json(CommandResponse {
        success: true,
        command: cmd,
        responses,
    }))
}
