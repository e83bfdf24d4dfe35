//! Tracing setup for the worker process.
//!
//! Diagnostics go to stderr and are controlled by `RUST_LOG`; the scheduler
//! captures stderr as the task log. Exit codes, not log text, are the
//! machine-readable outcome channel.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `info` if unset, so task logs always record
/// which actions ran and which were skipped.
///
/// # Example
/// ```bash
/// RUST_LOG=treeworker=debug treeworker run --task task.json
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
