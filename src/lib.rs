pub mod config;
pub mod control_api;
pub mod coordinator;
pub mod directory;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod media_server;
pub mod models;
pub mod protocol;
pub mod util;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use coordinator::Coordinator;
use directory::Directory;

/// Builds the combined control-plane + media-server router over a freshly
/// constructed Directory and Coordinator.
pub fn build_app(config: &config::Config) -> error::Result<(Router, Arc<Coordinator>)> {
    let directory = Directory::new();
    let coordinator = Arc::new(Coordinator::new(directory.clone()));

    let api_state = control_api::ApiState {
        directory,
        coordinator: coordinator.clone(),
    };
    let media_state = media_server::MediaServerState {
        media_root: config.media_root_canonical()?,
        subtitles_root: config.subtitles_root_canonical()?,
    };

    let app = Router::new()
        .merge(control_api::router(api_state))
        .merge(media_server::router(media_state))
        .layer(TraceLayer::new_for_http());

    info!(port = config.port, "castbridge router assembled");
    Ok((app, coordinator))
}
