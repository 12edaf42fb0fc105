use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::coordinator::Coordinator;
use crate::directory::Directory;
use crate::error::{CoreError, Result};
use crate::models::{CastRequest, ControlRequest};

#[derive(Clone)]
pub struct ApiState {
    pub directory: Directory,
    pub coordinator: Arc<Coordinator>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/devices", get(list_devices))
        .route("/devices/:id", get(get_device))
        .route("/devices/refresh", post(refresh_devices))
        .route("/cast", post(start_cast))
        .route("/control", post(control))
        .route("/status", get(status))
        .route("/stop", post(stop))
        .route("/shutdown", post(shutdown))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn list_devices(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(json!(state.directory.list().await))
}

async fn get_device(State(state): State<ApiState>, Path(id): Path<String>) -> Result<Json<serde_json::Value>> {
    let device = state.directory.get(&id).await.ok_or_else(|| CoreError::DeviceNotFound(id.clone()))?;
    Ok(Json(json!(device)))
}

async fn refresh_devices(State(state): State<ApiState>) -> Json<serde_json::Value> {
    let directory = state.directory.clone();
    tokio::spawn(async move { crate::discovery::refresh(&directory).await });
    Json(json!({ "status": "refreshing" }))
}

async fn start_cast(State(state): State<ApiState>, Json(req): Json<CastRequest>) -> Result<Json<serde_json::Value>> {
    state.coordinator.start(&req.device_id, &req.media_url, req.position).await?;
    Ok(Json(json!({ "status": "casting" })))
}

async fn control(State(state): State<ApiState>, Json(req): Json<ControlRequest>) -> Result<Json<serde_json::Value>> {
    state.coordinator.control(&req.action, req.value).await?;
    Ok(Json(json!({ "status": "ok" })))
}

async fn status(State(state): State<ApiState>) -> Json<serde_json::Value> {
    Json(json!(state.coordinator.status().await))
}

async fn stop(State(state): State<ApiState>) -> Result<Json<serde_json::Value>> {
    state.coordinator.stop().await?;
    Ok(Json(json!({ "status": "stopped" })))
}

async fn shutdown(State(state): State<ApiState>) -> impl IntoResponse {
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        state.coordinator.stop().await.ok();
        std::process::exit(0);
    });
    Json(json!({ "status": "shutting_down" }))
}
