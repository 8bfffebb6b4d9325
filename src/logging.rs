//! Tracing subscriber setup for the binary.

use tracing_subscriber::filter::EnvFilter;

/// Environment variable holding the filter directive (e.g. `rotasim=debug`).
pub const LOG_ENV_VAR: &str = "ROTASIM_LOG";

/// Installs a stderr subscriber. Repeated calls are ignored so tests and the
/// CLI can both call it.
pub fn init() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .with_env_var(LOG_ENV_VAR)
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
