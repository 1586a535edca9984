//! Global logging setup
//!
//! Installs a `tracing` subscriber that writes to stdout, filtered by `RUST_LOG`
//! (default `info`). Experiments additionally install a scoped subscriber that
//! mirrors events into their heartbeat file; see [`crate::reporting::Reporter`].

use std::sync::OnceLock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Default filter directive when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Build the env filter used by both the global and the heartbeat subscribers.
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Console filter for a scoped experiment subscriber: `RUST_LOG` when verbose, warnings
/// only otherwise.
#[must_use]
pub fn console_filter(verbose: bool) -> EnvFilter {
    if verbose {
        env_filter()
    } else {
        EnvFilter::new("warn")
    }
}

/// Initialize global logging.
///
/// Subsequent calls are no-ops. If another global subscriber is already installed
/// (a test harness, an embedding application) that subscriber is kept.
pub fn init() {
    INITIALIZED.get_or_init(|| {
        let subscriber = Registry::default()
            .with(env_filter())
            .with(fmt::layer().with_writer(std::io::stdout));
        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            tracing::debug!("Logging initialized");
        }
    });
}
