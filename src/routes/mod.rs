use axum::{extract::rejection::JsonRejection, Json, Router};

use crate::{AppState, ControlError};

mod battery;
mod command;
mod health;
mod logs;
mod mode;
mod serial;
mod sources;
mod thresholds;

// ---

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(battery::router())
        .merge(mode::router())
        .merge(thresholds::router())
        .merge(sources::router())
        .merge(command::router())
        .merge(serial::router())
        .merge(logs::router())
        .merge(health::router())
        .with_state(state)
}

/// Unwrap a JSON body, turning malformed input into a validation error.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ControlError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ControlError::validation(e.body_text()))
}
