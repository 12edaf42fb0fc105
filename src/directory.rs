use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::Device;

/// In-memory registry of discovered cast endpoints.
///
/// Mutations are serialized through the inner `RwLock`; every read returns an
/// owned snapshot so callers never hold a reference across an await point.
#[derive(Clone, Default)]
pub struct Directory {
    devices: Arc<RwLock<HashMap<String, Device>>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a device by id.
    pub async fn upsert(&self, device: Device) {
        self.devices.write().await.insert(device.id.clone(), device);
    }

    pub async fn get(&self, id: &str) -> Option<Device> {
        self.devices.read().await.get(id).cloned()
    }

    /// Devices sorted by friendly name, case-insensitive, tiebroken by id.
    pub async fn list(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = self.devices.read().await.values().cloned().collect();
        devices.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        devices
    }

    /// Drops every known device. Used only by an explicit refresh; any active
    /// session survives the removal of its device entry.
    pub async fn clear(&self) {
        self.devices.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Capabilities, Protocol};

    fn device(id: &str, name: &str) -> Device {
        Device {
            id: id.to_string(),
            name: name.to_string(),
            kind: Protocol::Chromecast,
            address: "10.0.0.1".into(),
            port: 8009,
            capabilities: Capabilities::chromecast_default(),
        }
    }

    #[tokio::test]
    async fn list_is_sorted_by_name() {
        let dir = Directory::new();
        dir.upsert(device("chromecast-1", "Bedroom")).await;
        dir.upsert(device("dlna-1", "Attic TV")).await;

        let listed = dir.list().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "Attic TV");
        assert_eq!(listed[1].name, "Bedroom");
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_id() {
        let dir = Directory::new();
        dir.upsert(device("chromecast-1", "Bedroom")).await;
        dir.upsert(device("chromecast-1", "Bedroom TV")).await;

        let listed = dir.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Bedroom TV");
    }

    #[tokio::test]
    async fn clear_removes_all_entries() {
        let dir = Directory::new();
        dir.upsert(device("chromecast-1", "Bedroom")).await;
        dir.clear().await;
        assert!(dir.list().await.is_empty());
        assert!(dir.get("chromecast-1").await.is_none());
    }
}
