use serde::{Deserialize, Serialize};

/// Supported casting protocols.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Chromecast,
    Dlna,
    AirPlay,
}

/// Declared or assumed playback capabilities of a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub video_codecs: Vec<String>,
    pub audio_codecs: Vec<String>,
    pub hdr: bool,
    pub dolby_vision: bool,
    pub subtitle_formats: Vec<String>,
}

impl Capabilities {
    pub fn chromecast_default() -> Self {
        Self {
            max_width: Some(3840),
            max_height: Some(2160),
            video_codecs: vec!["h264".into(), "hevc".into(), "vp8".into(), "vp9".into()],
            audio_codecs: vec!["aac".into(), "mp3".into(), "opus".into()],
            hdr: true,
            dolby_vision: false,
            subtitle_formats: vec!["vtt".into()],
        }
    }

    pub fn airplay_default() -> Self {
        Self {
            max_width: Some(3840),
            max_height: Some(2160),
            video_codecs: vec!["h264".into(), "hevc".into()],
            audio_codecs: vec!["aac".into(), "alac".into()],
            hdr: true,
            dolby_vision: true,
            subtitle_formats: vec!["vtt".into()],
        }
    }

    pub fn dlna_default() -> Self {
        Self {
            max_width: None,
            max_height: None,
            video_codecs: vec!["h264".into()],
            audio_codecs: vec!["aac".into(), "mp3".into()],
            hdr: false,
            dolby_vision: false,
            subtitle_formats: vec!["vtt".into(), "srt".into()],
        }
    }
}

/// A discovered cast-capable endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Protocol,
    pub address: String,
    pub port: u16,
    pub capabilities: Capabilities,
}

/// Lifecycle state of the single active session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Connecting,
    Buffering,
    Playing,
    Paused,
    Stopped,
    Error,
}

/// Snapshot of the coordinator's current session, returned by `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastStatus {
    pub casting: bool,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub position: f64,
    pub duration: f64,
    pub paused: bool,
    pub state: Option<SessionState>,
}

impl CastStatus {
    pub fn idle() -> Self {
        Self {
            casting: false,
            device_id: None,
            device_name: None,
            position: 0.0,
            duration: 0.0,
            paused: false,
            state: None,
        }
    }
}

/// Request body for `POST /cast`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastRequest {
    pub device_id: String,
    pub media_url: String,
    #[serde(default)]
    pub position: Option<f64>,
}

/// Request body for `POST /control`.
#[derive(Debug, Clone, Deserialize)]
pub struct ControlRequest {
    pub action: String,
    #[serde(default)]
    pub value: Option<f64>,
}

/// A uniform control-plane verb, parsed from `ControlRequest::action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Play,
    Pause,
    Seek,
    Volume,
    Stop,
}

impl ControlAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "play" => Some(Self::Play),
            "pause" => Some(Self::Pause),
            "seek" => Some(Self::Seek),
            "volume" => Some(Self::Volume),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }
}
