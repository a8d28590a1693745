//! Tracing setup for Marksync binaries.

use tracing_subscriber::EnvFilter;

use crate::types::settings::LoggingSettings;

/// Environment variable that takes precedence over `logging.filter`.
pub const ENV_LOG: &str = "MARKSYNC_LOG";

/// Installs a stderr `fmt` subscriber. Returns `false` if one was already set.
///
/// Output goes to stderr because stdout carries the RPC protocol.
pub fn init_tracing(settings: &LoggingSettings) -> bool {
    let filter = EnvFilter::try_from_env(ENV_LOG)
        .or_else(|_| EnvFilter::try_new(&settings.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(settings.ansi)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
