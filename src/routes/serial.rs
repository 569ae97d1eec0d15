use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{link::PortInfo, AppState, ControlError, EventKind};

// ---

#[derive(Debug, Default, Deserialize)]
struct ConnectRequest {
    #[serde(default)]
    port: Option<String>,
}

#[derive(Serialize)]
struct PortsResponse {
    ports: Vec<PortInfo>,
    /// Port `connect` would pick without an explicit choice.
    preferred: Option<String>,
}

#[derive(Serialize)]
struct StatusResponse {
    connected: bool,
    port: Option<String>,
    baud_rate: u32,
}

#[derive(Serialize)]
struct ConnectResponse {
    success: bool,
    port: String,
}

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/api/serial/ports", get(ports))
        .route("/api/serial/status", get(status))
        .route("/api/serial/connect", post(connect))
        .route("/api/serial/disconnect", post(disconnect))
}

async fn ports(State(app): State<AppState>) -> Json<PortsResponse> {
    // ---
    let ports = app.link.list_ports();
    let preferred = crate::pick_port(&ports);
    Json(PortsResponse { ports, preferred })
}

async fn status(State(app): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        connected: app.link.is_connected().await,
        port: app.link.current_port().await,
        baud_rate: app.link.settings().baud_rate,
    })
}

/// Handle `POST /api/serial/connect`; the body is optional.
async fn connect(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<Json<ConnectResponse>, ControlError> {
    // ---
    let req: ConnectRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ConnectRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ControlError::validation(e.to_string()))?
    };

    match app.link.connect(req.port.as_deref()).await {
        Ok(port) => {
            app.events
                .record(EventKind::Success, "serial", format!("connected {port}"))
                .await;
            Ok(Json(ConnectResponse {
                success: true,
                port,
            }))
        }
        Err(e) => {
            app.events
                .record(EventKind::Error, "serial", e.to_string())
                .await;
            Err(e.into())
        }
    }
}

async fn disconnect(State(app): State<AppState>) -> Json<StatusResponse> {
    // ---
    app.link.disconnect().await;
    app.events
        .record(EventKind::Info, "serial", "disconnected")
        .await;
    Json(StatusResponse {
        connected: false,
        port: None,
        baud_rate: app.link.settings().baud_rate,
    })
}
