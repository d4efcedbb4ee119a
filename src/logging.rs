//! Logging setup
//!
//! `RUST_LOG` wins over `[logging] level` so a field debug session needs no
//! config edit.

use tracing_subscriber::EnvFilter;

/// build the filter: RUST_LOG if set and valid, else the configured level
pub fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// install the global fmt subscriber. safe to call twice; the second call is a no-op.
pub fn init(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_target(false)
        .try_init();
}
