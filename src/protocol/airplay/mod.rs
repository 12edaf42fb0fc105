mod plist;

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use plist::{DictBuilder, PlistValue};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An HTTP control point for one AirPlay receiver on port 7000.
pub struct AirPlayClient {
    client: reqwest::Client,
    base_url: String,
}

/// Position/duration/paused snapshot parsed from `/playback-info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaybackInfo {
    pub position: f64,
    pub duration: f64,
    pub paused: bool,
}

impl AirPlayClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            client: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_default(),
            base_url: format!("http://{host}:{port}"),
        }
    }

    pub async fn server_info(&self) -> Result<()> {
        self.client
            .get(format!("{}/server-info", self.base_url))
            .send()
            .await
            .map_err(|e| CoreError::AirPlay(format!("server-info failed: {e}")))?;
        Ok(())
    }

    /// `start_position` is a fraction 0..1 of the media's duration, not a
    /// seconds value and not divided by 100.
    pub async fn play(&self, media_url: &str, start_position: f64) -> Result<()> {
        let body = DictBuilder::new()
            .insert("Content-Location", media_url)
            .insert("Start-Position", start_position.clamp(0.0, 1.0))
            .build();
        let encoded = plist::encode(&body);

        let response = self
            .client
            .post(format!("{}/play", self.base_url))
            .header("Content-Type", "application/x-apple-binary-plist")
            .body(encoded)
            .send()
            .await
            .map_err(|e| CoreError::AirPlay(format!("play failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CoreError::AirPlay(format!("play returned {}", response.status())));
        }
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        self.client
            .post(format!("{}/stop", self.base_url))
            .send()
            .await
            .map_err(|e| CoreError::AirPlay(format!("stop failed: {e}")))?;
        Ok(())
    }

    pub async fn seek(&self, position_secs: f64) -> Result<()> {
        self.client
            .post(format!("{}/scrub", self.base_url))
            .query(&[("position", position_secs)])
            .send()
            .await
            .map_err(|e| CoreError::AirPlay(format!("scrub failed: {e}")))?;
        Ok(())
    }

    pub async fn rate(&self, playing: bool) -> Result<()> {
        let value = if playing { 1 } else { 0 };
        self.client
            .post(format!("{}/rate", self.base_url))
            .query(&[("value", value)])
            .send()
            .await
            .map_err(|e| CoreError::AirPlay(format!("rate failed: {e}")))?;
        Ok(())
    }

    /// AirPlay volume is accepted by the uniform control vocabulary but has
    /// no wire effect; no receiver-side volume endpoint is part of this
    /// client's contract.
    pub async fn set_volume(&self, _level: u8) -> Result<()> {
        Ok(())
    }

    pub async fn playback_info(&self) -> Result<PlaybackInfo> {
        let response = self
            .client
            .get(format!("{}/playback-info", self.base_url))
            .send()
            .await
            .map_err(|e| CoreError::AirPlay(format!("playback-info failed: {e}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CoreError::AirPlay(format!("playback-info body read failed: {e}")))?;

        let value = plist::decode(&bytes).map_err(|e| CoreError::AirPlay(format!("playback-info decode failed: {e}")))?;
        Ok(parse_playback_info(&value))
    }
}

fn parse_playback_info(value: &PlistValue) -> PlaybackInfo {
    let Some(dict) = value.as_dict() else {
        return PlaybackInfo::default();
    };
    let position = dict.get("position").and_then(PlistValue::as_f64).unwrap_or(0.0);
    let duration = dict.get("duration").and_then(PlistValue::as_f64).unwrap_or(0.0);
    let rate = dict.get("rate").and_then(PlistValue::as_f64).unwrap_or(0.0);
    PlaybackInfo {
        position,
        duration,
        paused: rate == 0.0 && duration > 0.0,
    }
}

/// Background task: polls `/playback-info` once per second for as long as
/// the returned future is driven, reporting each snapshot through `on_update`.
/// Runs until the caller drops/aborts the task; transient poll errors are
/// logged and the loop continues rather than ending the session.
pub async fn poll_status<F, Fut>(client: &AirPlayClient, mut on_update: F)
where
    F: FnMut(PlaybackInfo) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        interval.tick().await;
        match client.playback_info().await {
            Ok(info) => on_update(info).await,
            Err(e) => {
                warn!(error = %e, "airplay status poll failed");
                debug!("continuing airplay status poll despite transient error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn derives_paused_from_zero_rate_and_known_duration() {
        let mut dict = HashMap::new();
        dict.insert("position".to_string(), PlistValue::Real(12.0));
        dict.insert("duration".to_string(), PlistValue::Real(120.0));
        dict.insert("rate".to_string(), PlistValue::Real(0.0));
        let info = parse_playback_info(&PlistValue::Dictionary(dict));
        assert!(info.paused);
        assert_eq!(info.position, 12.0);
    }

    #[test]
    fn not_paused_when_rate_nonzero() {
        let mut dict = HashMap::new();
        dict.insert("rate".to_string(), PlistValue::Real(1.0));
        dict.insert("duration".to_string(), PlistValue::Real(120.0));
        let info = parse_playback_info(&PlistValue::Dictionary(dict));
        assert!(!info.paused);
    }
}
