// src/logging.rs
// =============================================================================
// Sets up tracing for the whole program.
//
// Logs go to stderr, so stdout stays clean for the summary (and for --json).
// RUST_LOG overrides the default filter, e.g.:
//   RUST_LOG=site_mirror=trace site-mirror --mirror https://example.com
// =============================================================================

use tracing_subscriber::EnvFilter;

pub fn init(verbose: bool) {
    let default = if verbose {
        "site_mirror=debug,warn"
    } else {
        "site_mirror=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // try_init: tests may have installed a subscriber already
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
