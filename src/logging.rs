//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events under the `entify::*` targets;
//! binaries and tests decide whether anything is printed.

use std::io;

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Default filter: pipeline summaries at info, everything else at warn.
pub const DEFAULT_FILTER: &str = "warn,entify=info";

/// Installs a stderr fmt layer filtered by `RUST_LOG`, or `default_filter`
/// when the variable is unset or unparsable.
///
/// Returns false when a global subscriber was already installed, so it is
/// safe to call more than once.
pub fn init_logging(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stderr_log = fmt::layer()
        .with_writer(io::stderr)
        .with_target(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(stderr_log)
        .try_init()
        .is_ok()
}
