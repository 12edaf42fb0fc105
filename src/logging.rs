use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the structured logging subscriber.
///
/// Headless daemon, so unlike a desktop app there is no rolling log file —
/// stdout is the only sink and the deployer's process supervisor owns capture.
pub fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("castbridge=info,castbridged=info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true)
                .with_filter(env_filter),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "logging initialized");
}
