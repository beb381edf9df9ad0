use tracing_subscriber::EnvFilter;

/// Log to stderr, filtered by `RUST_LOG`, `info` when unset
///
/// Safe to call more than once, only the first call installs the subscriber
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}
