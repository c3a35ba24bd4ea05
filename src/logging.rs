//! Purpose: Subscriber setup for binaries and demos that embed the library.
//! Exports: `init_tracing`.
//! Invariants: The library only emits `tracing` events; it never installs a subscriber itself.
use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`). A second call
/// is a no-op.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
