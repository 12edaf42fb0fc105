use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors surfaced by the directory, protocol clients and the session coordinator.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("unsupported protocol for device: {0}")]
    UnsupportedProtocol(String),

    #[error("invalid device address: {0}")]
    InvalidAddress(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not currently casting")]
    NotCasting,

    #[error("unknown control action: {0}")]
    UnknownAction(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("operation timed out")]
    Timeout,

    #[error("chromecast error: {0}")]
    Chromecast(String),

    #[error("dlna error: {0}")]
    Dlna(String),

    #[error("airplay error: {0}")]
    AirPlay(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoreError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
