use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use socket2::{Domain, Protocol as SockProtocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::directory::Directory;
use crate::models::{Capabilities, Device, Protocol};
use crate::util::stable_id;

const SSDP_ADDR: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 1900);
const SEARCH_TARGET: &str = "urn:schemas-upnp-org:device:MediaRenderer:1";
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

const M_SEARCH: &str = "M-SEARCH * HTTP/1.1\r\n\
HOST: 239.255.255.250:1900\r\n\
MAN: \"ssdp:discover\"\r\n\
MX: 3\r\n\
ST: urn:schemas-upnp-org:device:MediaRenderer:1\r\n\r\n";

/// Sends a single SSDP M-SEARCH datagram and collects MediaRenderer
/// responses for `RECV_TIMEOUT`, upserting each into `directory`. Duplicate
/// LOCATION headers within one run are fetched only once.
pub async fn discover(directory: &Directory) -> anyhow::Result<()> {
    let socket = bind_socket()?;
    socket.send_to(M_SEARCH.as_bytes(), SocketAddr::V4(SSDP_ADDR)).await?;

    let mut seen_locations: HashSet<String> = HashSet::new();
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    let mut buf = [0u8; 2048];

    while tokio::time::Instant::now() < deadline {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => {
                let text = String::from_utf8_lossy(&buf[..len]);
                if let Some(location) = extract_header(&text, "LOCATION") {
                    if !seen_locations.insert(location.clone()) {
                        continue;
                    }
                    if let Err(e) = fetch_and_upsert(directory, &location).await {
                        warn!(location, error = %e, "failed to fetch ssdp device description");
                    }
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "ssdp recv error");
                break;
            }
            Err(_) => break, // deadline elapsed
        }
    }

    Ok(())
}

fn bind_socket() -> anyhow::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(SockProtocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)).into())?;
    Ok(UdpSocket::from_std(socket.into())?)
}

/// Drops the final path segment of the device description URL, leaving the
/// renderer's base URL the SOAP control paths are appended to.
fn strip_last_path_segment(url: &url::Url) -> url::Url {
    let mut segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
    segments.pop();
    let new_path = if segments.is_empty() { "/".to_string() } else { format!("/{}/", segments.join("/")) };
    let mut base = url.clone();
    base.set_path(&new_path);
    base
}

fn extract_header<'a>(response: &'a str, header: &str) -> Option<String> {
    response.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case(header) {
            Some(value.trim().to_string())
        } else {
            None
        }
    })
}

async fn fetch_and_upsert(directory: &Directory, location: &str) -> anyhow::Result<()> {
    let xml = reqwest::get(location).await?.text().await?;
    let (friendly_name, udn) = parse_description(&xml);
    let (Some(friendly_name), Some(udn)) = (friendly_name, udn) else {
        return Ok(()); // missing a required field; skip silently per spec
    };

    let url = url::Url::parse(location)?;
    let base = strip_last_path_segment(&url);

    let device = Device {
        id: stable_id("dlna", &udn),
        name: friendly_name,
        kind: Protocol::Dlna,
        address: base.as_str().trim_end_matches('/').to_string(),
        port: url.port().unwrap_or(80),
        capabilities: Capabilities::dlna_default(),
    };
    debug!(device_id = %device.id, name = %device.name, "ssdp resolved device");
    directory.upsert(device).await;
    Ok(())
}

/// Minimal tag-scoped extraction of `friendlyName` and `UDN` — the device
/// description schema is fixed and narrow enough that a full DOM parse buys
/// nothing here.
fn parse_description(xml: &str) -> (Option<String>, Option<String>) {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut friendly_name = None;
    let mut udn = None;
    let mut current_tag = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                current_tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                match current_tag.as_str() {
                    "friendlyName" => friendly_name = Some(text),
                    "UDN" => udn = Some(text),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    (friendly_name, udn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_location_header_case_insensitively() {
        let response = "HTTP/1.1 200 OK\r\nlocation: http://10.0.0.9:52235/desc.xml\r\nST: upnp:rootdevice\r\n\r\n";
        assert_eq!(
            extract_header(response, "LOCATION"),
            Some("http://10.0.0.9:52235/desc.xml".to_string())
        );
    }

    #[test]
    fn parses_friendly_name_and_udn() {
        let xml = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <device>
    <friendlyName>Attic TV</friendlyName>
    <UDN>uuid:1234</UDN>
  </device>
</root>"#;
        let (name, udn) = parse_description(xml);
        assert_eq!(name.as_deref(), Some("Attic TV"));
        assert_eq!(udn.as_deref(), Some("uuid:1234"));
    }

    #[test]
    fn missing_fields_yield_none() {
        let (name, udn) = parse_description("<root></root>");
        assert!(name.is_none());
        assert!(udn.is_none());
    }

    #[test]
    fn strips_only_the_final_path_segment() {
        let url = url::Url::parse("http://10.0.0.9:52235/desc/device.xml").unwrap();
        assert_eq!(strip_last_path_segment(&url).as_str(), "http://10.0.0.9:52235/desc/");
    }

    #[test]
    fn strips_single_segment_path_to_root() {
        let url = url::Url::parse("http://10.0.0.9:52235/desc.xml").unwrap();
        assert_eq!(strip_last_path_segment(&url).as_str(), "http://10.0.0.9:52235/");
    }
}
