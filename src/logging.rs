use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber.
///
/// Use the RUST_LOG environment variable to override the default `info`
/// level, e.g. `RUST_LOG=debug` to see every appended record and every
/// failed probe.
pub fn init_logging() {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.try_init()
		.ok();
}
