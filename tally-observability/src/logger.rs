use tracing_subscriber::EnvFilter;

/// Build the log filter: `RUST_LOG` wins, then `level`, then `info`.
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|e| {
            eprintln!("Invalid log level '{level}': {e}. Falling back to 'info'");
            EnvFilter::new("info")
        })
}

/// Install the global fmt subscriber. Call once, from the binary.
pub fn init(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_target(true)
        .init();
}
