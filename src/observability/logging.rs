//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for the binary
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` overrides the default filter
//! - The library never installs a subscriber itself

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a fmt subscriber filtered by `RUST_LOG`, or `default_filter`
/// when it is unset or invalid.
///
/// Returns an error if a global subscriber is already installed.
pub fn init(default_filter: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
}

/// The default filter for a verbosity name such as `info` or `debug`.
pub fn default_filter(level: &str) -> String {
    format!("httpclient_config={level},warn")
}
