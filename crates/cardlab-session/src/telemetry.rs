//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::SessionConfig;

/// Install a formatted subscriber filtered by `RUST_LOG`, or by
/// `default_directive` when it is unset.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .is_ok()
}

/// [`init_tracing`] with the config's `log_filter` as the default.
pub fn init_from_config(config: &SessionConfig) -> bool {
    init_tracing(&config.log_filter)
}
