use std::net::IpAddr;
use std::time::Duration;

use tracing::{debug, warn};

use crate::directory::Directory;
use crate::models::{Capabilities, Device, Protocol};
use crate::util::stable_id;

const CHROMECAST_SERVICE: &str = "_googlecast._tcp.local.";
const AIRPLAY_SERVICE: &str = "_airplay._tcp.local.";
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Browses both cast-capable mDNS service types and upserts every resolved
/// instance into `directory`. One resolve attempt per service type, bounded
/// by `RESOLVE_TIMEOUT` so a peer that never answers can't hang discovery.
pub async fn discover(directory: &Directory) -> anyhow::Result<()> {
    browse_service(directory, CHROMECAST_SERVICE, Protocol::Chromecast, 8009).await?;
    browse_service(directory, AIRPLAY_SERVICE, Protocol::AirPlay, 7000).await?;
    Ok(())
}

async fn browse_service(
    directory: &Directory,
    service_type: &str,
    protocol: Protocol,
    default_port: u16,
) -> anyhow::Result<()> {
    let mdns = mdns_sd::ServiceDaemon::new()?;
    let receiver = mdns.browse(service_type)?;

    let deadline = tokio::time::Instant::now() + RESOLVE_TIMEOUT;
    let mut found = 0usize;

    while tokio::time::Instant::now() < deadline {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining.min(Duration::from_millis(500)), receiver.recv_async()).await {
            Ok(Ok(mdns_sd::ServiceEvent::ServiceResolved(info))) => {
                let Some(address) = info.get_addresses().iter().next() else {
                    continue;
                };
                let ip = match address {
                    IpAddr::V4(v4) => v4.to_string(),
                    IpAddr::V6(v6) => v6.to_string(),
                };
                let port = if info.get_port() != 0 { info.get_port() } else { default_port };
                let prefix = match protocol {
                    Protocol::Chromecast => "chromecast",
                    Protocol::AirPlay => "airplay",
                    Protocol::Dlna => unreachable!("dlna is discovered via ssdp, not mdns"),
                };
                let device = Device {
                    id: stable_id(prefix, info.get_fullname()),
                    name: instance_name(info.get_fullname(), service_type),
                    kind: protocol,
                    address: ip,
                    port,
                    capabilities: match protocol {
                        Protocol::Chromecast => Capabilities::chromecast_default(),
                        Protocol::AirPlay => Capabilities::airplay_default(),
                        Protocol::Dlna => Capabilities::dlna_default(),
                    },
                };
                debug!(device_id = %device.id, name = %device.name, "mdns resolved device");
                directory.upsert(device).await;
                found += 1;
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                warn!(error = %e, service_type, "mdns receiver error");
                break;
            }
            Err(_) => {} // per-recv timeout slice elapsed, loop and check outer deadline
        }
    }

    mdns.shutdown().ok();
    debug!(service_type, found, "mdns browse complete");
    Ok(())
}

/// Strips the `.<service_type>` suffix off an mDNS fullname, leaving the
/// service instance name (e.g. the Chromecast's own display name) rather
/// than the underlying machine hostname.
fn instance_name(fullname: &str, service_type: &str) -> String {
    fullname
        .strip_suffix(&format!(".{service_type}"))
        .unwrap_or(fullname)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_service_type_suffix() {
        assert_eq!(instance_name("Living Room._googlecast._tcp.local.", CHROMECAST_SERVICE), "Living Room");
    }

    #[test]
    fn falls_back_to_fullname_when_suffix_does_not_match() {
        assert_eq!(instance_name("Living Room.local.", CHROMECAST_SERVICE), "Living Room.local.");
    }
}
