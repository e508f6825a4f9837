//! Diagnostic logging setup.
//!
//! User-facing output goes through `ui`; this wires up the `tracing`
//! diagnostics that are normally silent. Setting `PACE_DEBUG=true` turns on
//! debug-level logs, and `RUST_LOG` still works for finer control.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let default_filter = if std::env::var("PACE_DEBUG").as_deref() == Ok("true") {
        "pace=debug,pace_lib=debug,pace_cache=debug,pace_globwalk=debug,pace_hash=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    // a second init (e.g. in tests) is fine, keep the first subscriber
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}
