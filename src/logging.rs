//! Diagnostic logging
//!
//! The library only emits `tracing` events; the binary installs a subscriber
//! writing to stderr so command output on stdout stays untouched.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the filter directives, e.g. `dirc=debug`
pub const LOG_ENV_VAR: &str = "DIRC_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Install the global subscriber; a second call is a no-op
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
