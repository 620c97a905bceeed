use tracing_subscriber::EnvFilter;

/// Send logs to stderr so stdout only carries results.
///
/// `RUST_LOG` wins over the verbosity flag when set.
pub fn init(verbose: bool) {
    let default = if verbose { "geoloc=debug,geoloc_core=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
