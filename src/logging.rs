//! Tracing initialization.
//!
//! Callers embedding this crate in a service are free to configure their
//! own subscriber; `init()` is a convenience for binaries and tests that
//! want sane defaults (env-filter driven by `RUST_LOG`, falling back to
//! `info`).

use tracing_subscriber::{EnvFilter, fmt};

/// Install a global `tracing` subscriber. Safe to call more than once;
/// subsequent calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
