use std::path::PathBuf;

use clap::Parser;

/// Startup configuration for the casting helper daemon.
///
/// Parsed once at process start; there is no hot reload and nothing here is
/// persisted across runs (that remains a host-player concern).
#[derive(Debug, Clone, Parser)]
#[command(name = "castbridged", about = "Casts locally playing media to Chromecast, DLNA and AirPlay devices")]
pub struct Config {
    /// Port for the combined control-plane and media HTTP server.
    #[arg(long, env = "PORT", default_value_t = 9876)]
    pub port: u16,

    /// Root directory media files are served from (GET /media/<path>).
    #[arg(long, env = "MEDIA_ROOT", default_value = ".")]
    pub media_root: PathBuf,

    /// Root directory WebVTT sidecar subtitles are served from.
    #[arg(long, env = "SUBTITLES_ROOT")]
    pub subtitles_root: Option<PathBuf>,
}

impl Config {
    /// Canonicalized media root, used as the allow-list prefix for path traversal checks.
    pub fn media_root_canonical(&self) -> crate::error::Result<PathBuf> {
        std::fs::canonicalize(&self.media_root).map_err(crate::error::CoreError::Io)
    }

    /// Canonicalized subtitles root, defaulting to the media root when unset.
    pub fn subtitles_root_canonical(&self) -> crate::error::Result<PathBuf> {
        match &self.subtitles_root {
            Some(path) => std::fs::canonicalize(path).map_err(crate::error::CoreError::Io),
            None => self.media_root_canonical(),
        }
    }
}
