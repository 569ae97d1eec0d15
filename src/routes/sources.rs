//! External battery sources: phones, power banks and tablets push their
//! percentage here, and the operator picks which one drives AUTO mode.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::json_body;
use crate::{models::SensorSource, AppState, ControlError, EventKind};

// ---

#[derive(Debug, Deserialize)]
struct UpsertRequest {
    name: String,
    percentage: f64,
    #[serde(default)]
    device_type: String,
}

#[derive(Debug, Deserialize)]
struct ActiveRequest {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Serialize)]
struct SourcesResponse {
    active: String,
    sources: Vec<SensorSource>,
}

#[derive(Serialize)]
struct ActiveResponse {
    /// Source name, or null for the local battery.
    name: Option<String>,
    active: String,
    percentage: Option<f64>,
}

#[derive(Serialize)]
struct RemovedResponse {
    success: bool,
    removed: SensorSource,
    active: String,
}

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/sources", get(list).post(upsert))
        .route("/api/sources/active", get(get_active).post(set_active))
        .route("/api/sources/{name}", delete(remove))
}

async fn list(State(app): State<AppState>) -> Json<SourcesResponse> {
    // ---
    let mut sources = app.registry.list().await;
    sources.sort_by(|a, b| a.name.cmp(&b.name));
    Json(SourcesResponse {
        active: app.registry.active().await.to_string(),
        sources,
    })
}

async fn upsert(
    State(app): State<AppState>,
    payload: Result<Json<UpsertRequest>, JsonRejection>,
) -> Result<Json<SensorSource>, ControlError> {
    // ---
    let req = json_body(payload)?;
    let source = app
        .registry
        .upsert(&req.name, req.percentage, &req.device_type)
        .await?;
    tracing::debug!(
        source = %source.name,
        percentage = source.percentage,
        device_type = %source.device_type,
        "Source reading pushed"
    );
    Ok(Json(source))
}

async fn remove(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<RemovedResponse>, ControlError> {
    // ---
    let removed = app.registry.remove(&name).await?;
    info!("DELETE /api/sources/{} - removed", name);
    app.events
        .record(EventKind::Info, "source", format!("removed {name}"))
        .await;

    Ok(Json(RemovedResponse {
        success: true,
        removed,
        active: app.registry.active().await.to_string(),
    }))
}

async fn active_response(app: &AppState) -> ActiveResponse {
    // ---
    let active = app.registry.active().await;
    ActiveResponse {
        name: active.name().map(str::to_string),
        active: active.to_string(),
        percentage: app.registry.resolve_active().await.ok(),
    }
}

async fn get_active(State(app): State<AppState>) -> Json<ActiveResponse> {
    Json(active_response(&app).await)
}

async fn set_active(
    State(app): State<AppState>,
    payload: Result<Json<ActiveRequest>, JsonRejection>,
) -> Result<Json<ActiveResponse>, ControlError> {
    // ---
    let req = json_body(payload)?;
    let active = app.registry.set_active(req.name.as_deref()).await?;
    info!("POST /api/sources/active - {}", active);
    app.events
        .record(EventKind::Info, "source", format!("active source: {active}"))
        .await;

    Ok(Json(active_response(&app).await))
}
