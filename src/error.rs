//! Error taxonomy for the charging controller.
//!
//! Link-layer failures are kept in their own [`LinkError`] so the serial code
//! does not depend on the wider control surface. Everything the HTTP facade can
//! return is a [`ControlError`], which maps onto a status code and a JSON body.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

// ---

/// Failures of the serial link itself.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("no serial ports found")]
    NoDevice,

    #[error("failed to open {port}: {reason}")]
    Open { port: String, reason: String },

    #[error("serial not connected")]
    NotConnected,

    #[error("serial write failed: {0}")]
    Write(std::io::Error),

    #[error("serial read failed: {0}")]
    Read(std::io::Error),
}

/// Errors surfaced by controller, registry and facade operations.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("battery not detected")]
    SensorUnavailable,
}

pub type Result<T> = std::result::Result<T, ControlError>;

impl ControlError {
    // ---
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        // ---
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Link(_) | Self::SensorUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ControlError {
    fn into_response(self) -> axum::response::Response {
        // ---
        let status = self.status_code();
        let body = Json(json!({ "success": false, "error": self.to_string() }));
        (status, body).into_response()
    }
}
