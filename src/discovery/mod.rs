pub mod mdns;
pub mod ssdp;

use tracing::{info, warn};

use crate::directory::Directory;

/// Runs both discovery sources once, clearing the directory first so a
/// refresh reflects only devices currently answering. Any in-flight session
/// is unaffected — a session outlives the removal of its device entry.
pub async fn refresh(directory: &Directory) {
    directory.clear().await;

    if let Err(e) = mdns::discover(directory).await {
        warn!(error = %e, "mdns discovery failed");
    }
    if let Err(e) = ssdp::discover(directory).await {
        warn!(error = %e, "ssdp discovery failed");
    }

    info!(count = directory.list().await.len(), "discovery refresh complete");
}
