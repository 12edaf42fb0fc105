pub mod airplay;
pub mod chromecast;
pub mod dlna;

use crate::error::Result;
use crate::models::Device;
use airplay::AirPlayClient;
use chromecast::ChromecastClient;
use dlna::DlnaClient;

/// A connected, protocol-specific cast session, dispatched by match rather
/// than a trait object — there are exactly three protocols and their
/// connect/control surfaces differ enough (TLS channel vs. stateless HTTP)
/// that a shared trait would mostly be boilerplate.
pub enum ClientHandle {
    Chromecast(ChromecastClient),
    Dlna(DlnaClient),
    AirPlay(AirPlayClient),
}

impl ClientHandle {
    pub async fn connect(device: &Device) -> Result<Self> {
        use crate::models::Protocol;
        match device.kind {
            Protocol::Chromecast => {
                let client = ChromecastClient::connect(&device.address, device.port).await?;
                Ok(Self::Chromecast(client))
            }
            Protocol::Dlna => Ok(Self::Dlna(DlnaClient::new(&device.address))),
            Protocol::AirPlay => {
                let client = AirPlayClient::new(&device.address, device.port);
                client.server_info().await?;
                Ok(Self::AirPlay(client))
            }
        }
    }

    pub async fn load(&self, media_url: &str, start_position_secs: f64, duration_secs: f64, title: &str) -> Result<()> {
        match self {
            Self::Chromecast(c) => c.load(media_url, start_position_secs).await,
            Self::Dlna(c) => {
                c.set_av_transport_uri(media_url, title).await?;
                c.play().await?;
                if start_position_secs > 0.0 {
                    c.seek(start_position_secs).await?;
                }
                Ok(())
            }
            Self::AirPlay(c) => {
                let fraction = if duration_secs > 0.0 { start_position_secs / duration_secs } else { 0.0 };
                c.play(media_url, fraction).await
            }
        }
    }

    pub async fn play(&self) -> Result<()> {
        match self {
            Self::Chromecast(c) => c.play().await,
            Self::Dlna(c) => c.play().await,
            Self::AirPlay(c) => c.rate(true).await,
        }
    }

    pub async fn pause(&self) -> Result<()> {
        match self {
            Self::Chromecast(c) => c.pause().await,
            Self::Dlna(c) => c.pause().await,
            Self::AirPlay(c) => c.rate(false).await,
        }
    }

    pub async fn stop(&self) -> Result<()> {
        match self {
            Self::Chromecast(c) => c.stop().await,
            Self::Dlna(c) => c.stop().await,
            Self::AirPlay(c) => c.stop().await,
        }
    }

    pub async fn seek(&self, position_secs: f64) -> Result<()> {
        match self {
            Self::Chromecast(c) => c.seek(position_secs).await,
            Self::Dlna(c) => c.seek(position_secs).await,
            Self::AirPlay(c) => c.seek(position_secs).await,
        }
    }

    /// `value` is the uniform 0..100 vocabulary; each protocol maps it to
    /// its own scale.
    pub async fn set_volume(&self, value: u8) -> Result<()> {
        match self {
            Self::Chromecast(c) => c.set_volume(value as f64 / 100.0).await,
            Self::Dlna(c) => c.set_volume(value).await,
            Self::AirPlay(c) => c.set_volume(value).await,
        }
    }

    pub async fn disconnect(&self) -> Result<()> {
        match self {
            Self::Chromecast(c) => {
                c.disconnect().await;
                Ok(())
            }
            Self::Dlna(_) | Self::AirPlay(_) => Ok(()), // stateless HTTP, nothing to tear down
        }
    }

    /// Resolves when the protocol channel detects it has been lost. DLNA and
    /// AirPlay are stateless HTTP with no persistent channel to lose, so this
    /// never resolves for them; only Chromecast's CASTV2 socket has a
    /// heartbeat that can flag loss.
    pub async fn wait_for_loss(&self) {
        match self {
            Self::Chromecast(c) => c.wait_lost().await,
            Self::Dlna(_) | Self::AirPlay(_) => std::future::pending::<()>().await,
        }
    }
}
