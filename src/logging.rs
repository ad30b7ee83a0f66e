use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber used by binaries embedding the engine
///
/// Honors `RUST_LOG`, defaulting to `info`. Calling it again after a subscriber
/// is installed does nothing.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("Tracing initialized");
    }
}
