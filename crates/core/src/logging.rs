//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the logging system with tracing.
///
/// This sets up tracing-subscriber with:
/// - Environment-based filtering (RUST_LOG)
/// - Targets and thread ids on every line
///
/// Per-frame state transitions are logged at `trace` level and only show up
/// with `RUST_LOG=vkpresent_renderer=trace`.
///
/// # Example
/// ```
/// vkpresent_core::init_logging();
/// tracing::info!("Presenter starting");
/// ```
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vkpresent=debug,winit=warn"));

    // A second call (e.g. from doctests) leaves the first subscriber in place.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
