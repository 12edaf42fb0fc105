mod didl;
mod time;

use crate::error::{CoreError, Result};
pub use time::{format_time, parse_time};

const AVT_SERVICE: &str = "urn:schemas-upnp-org:service:AVTransport:1";
const RC_SERVICE: &str = "urn:schemas-upnp-org:service:RenderingControl:1";

/// A SOAP/AVTransport control point for one DLNA MediaRenderer.
///
/// `base_url` is the renderer's device description base; this crate assumes
/// the conventional `/AVTransport/control` and `/RenderingControl/control`
/// paths rather than parsing `<controlURL>` out of the description document,
/// matching every MediaRenderer observed in practice.
pub struct DlnaClient {
    client: reqwest::Client,
    base_url: String,
}

impl DlnaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn action(&self, service: &str, path: &str, action: &str, args: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let body = format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
  <s:Body>
    <u:{action} xmlns:u="{service}">
{args}
    </u:{action}>
  </s:Body>
</s:Envelope>"#
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", r#"text/xml; charset="utf-8""#)
            .header("SOAPAction", format!("\"{service}#{action}\""))
            .body(body)
            .send()
            .await
            .map_err(|e| CoreError::Dlna(format!("{action} request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CoreError::Dlna(format!("{action} returned {}", response.status())));
        }
        response
            .text()
            .await
            .map_err(|e| CoreError::Dlna(format!("{action} body read failed: {e}")))
    }

    pub async fn set_av_transport_uri(&self, media_url: &str, title: &str) -> Result<()> {
        let metadata = didl::build_metadata(media_url, title);
        let args = format!(
            "<InstanceID>0</InstanceID><CurrentURI>{}</CurrentURI><CurrentURIMetaData>{}</CurrentURIMetaData>",
            didl::escape(media_url),
            metadata
        );
        self.action(AVT_SERVICE, "/AVTransport/control", "SetAVTransportURI", &args).await?;
        Ok(())
    }

    pub async fn play(&self) -> Result<()> {
        let args = "<InstanceID>0</InstanceID><Speed>1</Speed>";
        self.action(AVT_SERVICE, "/AVTransport/control", "Play", args).await?;
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        let args = "<InstanceID>0</InstanceID>";
        self.action(AVT_SERVICE, "/AVTransport/control", "Pause", args).await?;
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let args = "<InstanceID>0</InstanceID>";
        self.action(AVT_SERVICE, "/AVTransport/control", "Stop", args).await?;
        Ok(())
    }

    pub async fn seek(&self, position_secs: f64) -> Result<()> {
        let args = format!(
            "<InstanceID>0</InstanceID><Unit>REL_TIME</Unit><Target>{}</Target>",
            time::format_time(position_secs)
        );
        self.action(AVT_SERVICE, "/AVTransport/control", "Seek", &args).await?;
        Ok(())
    }

    /// `level` is 0..100, the uniform volume vocabulary; RenderingControl
    /// takes the same scale so no remapping is needed here.
    pub async fn set_volume(&self, level: u8) -> Result<()> {
        let args = format!("<InstanceID>0</InstanceID><Channel>Master</Channel><DesiredVolume>{level}</DesiredVolume>");
        self.action(RC_SERVICE, "/RenderingControl/control", "SetVolume", &args).await?;
        Ok(())
    }

    pub async fn position_info(&self) -> Result<PositionInfo> {
        let args = "<InstanceID>0</InstanceID>";
        let body = self.action(AVT_SERVICE, "/AVTransport/control", "GetPositionInfo", args).await?;
        Ok(PositionInfo {
            position: extract_tag(&body, "RelTime").and_then(|t| time::parse_time(&t)).unwrap_or(0.0),
            duration: extract_tag(&body, "TrackDuration").and_then(|t| time::parse_time(&t)).unwrap_or(0.0),
        })
    }

    pub async fn transport_state(&self) -> Result<String> {
        let args = "<InstanceID>0</InstanceID>";
        let body = self.action(AVT_SERVICE, "/AVTransport/control", "GetTransportInfo", args).await?;
        Ok(extract_tag(&body, "CurrentTransportState").unwrap_or_else(|| "STOPPED".to_string()))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PositionInfo {
    pub position: f64,
    pub duration: f64,
}

fn extract_tag(xml: &str, tag: &str) -> Option<String> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut in_tag = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == tag.as_bytes() => in_tag = true,
            Ok(Event::Text(e)) if in_tag => {
                return e.unescape().ok().map(|s| s.to_string());
            }
            Ok(Event::End(e)) if e.name().as_ref() == tag.as_bytes() => in_tag = false,
            Ok(Event::Eof) => return None,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tag_text() {
        let xml = "<s:Envelope><s:Body><u:GetPositionInfoResponse><RelTime>0:01:30</RelTime></u:GetPositionInfoResponse></s:Body></s:Envelope>";
        assert_eq!(extract_tag(xml, "RelTime").as_deref(), Some("0:01:30"));
    }

    #[test]
    fn missing_tag_yields_none() {
        assert_eq!(extract_tag("<a></a>", "RelTime"), None);
    }
}
