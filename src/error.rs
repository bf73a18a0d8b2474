use std::io;
use std::path::PathBuf;

/// Fatal errors of the measurement engine.
///
/// Probe failures never show up here; they are collapsed into absent
/// latencies at the probe boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("failed to read {kind} file '{}': {source}", path.display())]
	InputFile {
		kind: &'static str,
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("invalid server address '{input}': {reason}")]
	InvalidServer {
		input: String,
		reason: String,
	},

	#[error("failed to open log '{}': {source}", path.display())]
	LogOpen {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("failed to append to log '{}': {source}", path.display())]
	LogAppend {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("failed to read log '{}': {source}", path.display())]
	LogRead {
		path: PathBuf,
		#[source]
		source: csv::Error,
	},

	#[error("failed to parse config file '{}': {source}", path.display())]
	ConfigParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid configuration: {0}")]
	InvalidConfig(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
