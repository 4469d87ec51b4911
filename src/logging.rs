//! Logging setup.
//!
//! Module paths use `schedgraph::` as the filter target so `RUST_LOG` can be
//! scoped to the crate without pulling in every dependency's trace output.

use crate::config::Config;
use tracing_subscriber::EnvFilter;

/// Configure and install the global tracing subscriber.
///
/// Idempotent-ish in tests: failures to install (a subscriber already set)
/// are ignored rather than panicking, since multiple test modules may call
/// this in the same process.
pub fn setup_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.log_level;
        EnvFilter::new(format!("warn,schedgraph={level}"))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(filter)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
