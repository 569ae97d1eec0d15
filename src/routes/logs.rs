use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{events::ActivityEntry, AppState};

// ---

#[derive(Debug, Deserialize)]
struct LogsQuery {
    limit: Option<usize>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/logs", get(handler))
}

async fn handler(
    Query(params): Query<LogsQuery>,
    State(app): State<AppState>,
) -> Json<Vec<ActivityEntry>> {
    Json(app.events.recent(params.limit.unwrap_or(50)).await)
}
