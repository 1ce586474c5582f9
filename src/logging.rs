//! Tracing setup for the binary.
//!
//! Logs go to stderr so that JSON on stdout stays machine-readable.
//! `RUST_LOG` wins over the configured filter.

use tracing_subscriber::EnvFilter;

/// Filter used when neither `RUST_LOG` nor the config names one.
pub const DEFAULT_FILTER: &str = "taskminder=warn";

/// Build the filter from `RUST_LOG`, then `configured`, then the default.
#[must_use]
pub fn env_filter(configured: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        configured
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
    })
}

/// Install the global subscriber.
///
/// Calling it again is harmless; the first subscriber stays in place.
pub fn init(configured: Option<&str>) {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter(configured))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
