use axum::{extract::rejection::JsonRejection, extract::State, routing::get, Json, Router};
use serde::Serialize;

use super::json_body;
use crate::{models::ThresholdUpdate, AppState, ControlError, Thresholds};

// ---

#[derive(Serialize)]
struct UpdatedResponse {
    success: bool,
    #[serde(flatten)]
    thresholds: Thresholds,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/thresholds", get(get_thresholds).post(set_thresholds))
}

async fn get_thresholds(State(app): State<AppState>) -> Json<Thresholds> {
    Json(app.controller.thresholds().await)
}

async fn set_thresholds(
    State(app): State<AppState>,
    payload: Result<Json<ThresholdUpdate>, JsonRejection>,
) -> Result<Json<UpdatedResponse>, ControlError> {
    // ---
    let update = json_body(payload)?;
    let thresholds = app.controller.set_thresholds(update).await?;
    Ok(Json(UpdatedResponse {
        success: true,
        thresholds,
    }))
}
