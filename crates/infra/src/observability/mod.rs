//! Tracing subscriber setup
//!
//! The library crates only emit `tracing` events; the host process decides
//! where they go. [`init_tracing`] is the default choice: a `fmt` subscriber
//! filtered by `RUST_LOG`, falling back to the configured level.

use resync_domain::LoggingSettings;
use tracing_subscriber::EnvFilter;

/// Directives appended to every filter to keep dependency chatter down.
const NOISY_CRATES: &str = ",hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn";

/// Install the global tracing subscriber.
///
/// Returns `false` if a subscriber was already installed, in which case the
/// existing one is left in place. Safe to call more than once.
pub fn init_tracing(settings: &LoggingSettings) -> bool {
    let builder = tracing_subscriber::fmt().with_env_filter(filter_for(settings)).with_target(false);

    let installed = if settings.json {
        builder.json().try_init().is_ok()
    } else {
        builder.compact().try_init().is_ok()
    };

    if installed {
        tracing::debug!(level = %settings.level, json = settings.json, "Tracing initialized");
    }
    installed
}

fn filter_for(settings: &LoggingSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}{}", settings.level, NOISY_CRATES)))
}
