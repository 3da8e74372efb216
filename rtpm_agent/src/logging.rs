//! tracing setup shared by the agent and hub binaries.

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; otherwise `default_directive` (e.g. "info").
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    // A second init (tests spawning several binaries in-process) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
