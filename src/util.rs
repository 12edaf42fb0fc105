/// FNV-1a over raw bytes. Non-cryptographic, deterministic, good enough to
/// turn an mDNS service name or SSDP UDN into a short stable device id.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    bytes.iter().fold(OFFSET_BASIS, |hash, &b| (hash ^ b as u64).wrapping_mul(PRIME))
}

/// Builds a device id of the form `<prefix>-<16 hex chars>` from a
/// protocol-namespaced identity string (service name, UDN, ...).
pub fn stable_id(prefix: &str, identity: &str) -> String {
    format!("{prefix}-{:016x}", fnv1a(identity.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_id_is_deterministic() {
        let a = stable_id("chromecast", "Living Room._googlecast._tcp.local.");
        let b = stable_id("chromecast", "Living Room._googlecast._tcp.local.");
        assert_eq!(a, b);
        assert!(a.starts_with("chromecast-"));
        assert_eq!(a.len(), "chromecast-".len() + 16);
    }

    #[test]
    fn stable_id_differs_by_identity() {
        let a = stable_id("dlna", "uuid:device-1");
        let b = stable_id("dlna", "uuid:device-2");
        assert_ne!(a, b);
    }
}
