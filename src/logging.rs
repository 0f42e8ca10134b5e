//! Tracing initialization.

use tracing_subscriber::filter::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` when set, otherwise from `directive`
/// (typically the configured `log_level`). Initialization is idempotent:
/// calling it twice leaves the first subscriber in place.
pub fn init(directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
