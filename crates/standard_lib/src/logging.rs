//! Process logging setup.
//!
//! A thin wrapper over `tracing-subscriber` so binaries and tests share one
//! initialization path. Respects `RUST_LOG` when set; safe to call more
//! than once (later calls are no-ops).

use tracing_subscriber::EnvFilter;

/// Install the global subscriber with an `info` default.
pub fn init() {
    init_with_filter("info");
}

/// Install the global subscriber. `default_filter` applies when `RUST_LOG`
/// is not set (e.g. `"debug"` or `"standard_lib=debug,info"`).
pub fn init_with_filter(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(true)
        .try_init();
}
