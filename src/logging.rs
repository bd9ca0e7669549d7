use env_logger::Env;

/// Initialize logging.
///
/// `RUST_LOG` takes precedence; `default_filter` applies when it is unset.
pub fn init(default_filter: &str) {
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp_secs()
        .init();
}
