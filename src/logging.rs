//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr so tool output on stdout stays clean. `RUST_LOG`
//! wins when set; otherwise `--debug` turns on this crate's `debug` events
//! and the default is `warn`.

use std::io;
use tracing_subscriber::EnvFilter;

pub fn init(debug: bool) {
    // Dependencies (reqwest, hyper) stay at warn even in debug mode.
    let level = if debug { "warn,toolbelt=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .try_init();
}
