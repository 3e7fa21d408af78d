//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the logging system with tracing.
///
/// `default_filter` is used unless `RUST_LOG` is set, in which case the
/// environment wins. Calling this twice is harmless; the second call keeps
/// the subscriber that is already installed.
///
/// # Example
/// ```
/// ember_core::init_logging("info,ember=debug");
/// tracing::info!("Engine initialized");
/// ```
pub fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}
