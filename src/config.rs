use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::domains::DEFAULT_REFERENCE_DOMAIN;
use crate::error::{Error, Result};

/// Settings of the latency-measurement loop.
///
/// Every field has a default, so a TOML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeasureConfig {
	pub servers_file: PathBuf,
	pub domains_file: PathBuf,
	pub output_file: PathBuf,
	/// Seconds between ticks
	pub interval: u64,
	/// Random perturbation of `interval`, as a fraction of it
	pub jitter: f64,
	/// Total run length in seconds, unbounded when absent
	pub duration: Option<u64>,
	/// Stop after this many ticks
	pub max_ticks: Option<u64>,
	pub ping_enabled: bool,
	pub dns_query_enabled: bool,
	/// Seconds between self-reports, 0 disables them
	pub analysis_interval: u64,
	pub reference_domain: String,
	pub query_timeout_millis: u64,
	pub ping_timeout_millis: u64,
	pub seed: Option<u64>,
}

impl Default for MeasureConfig {
	fn default() -> Self {
		Self {
			servers_file: PathBuf::from("dns_servers.txt"),
			domains_file: PathBuf::from("new_domains.txt"),
			output_file: PathBuf::from("dns_latency_results.csv"),
			interval: 60,
			jitter: 0.1,
			duration: None,
			max_ticks: None,
			ping_enabled: true,
			dns_query_enabled: true,
			analysis_interval: 600,
			reference_domain: DEFAULT_REFERENCE_DOMAIN.to_string(),
			query_timeout_millis: 5000,
			ping_timeout_millis: 4000,
			seed: None,
		}
	}
}

impl MeasureConfig {
	/// Load a TOML file on top of the defaults.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|source| Error::InputFile {
			kind: "config",
			path: path.to_path_buf(),
			source,
		})?;
		toml::from_str(&content).map_err(|source| Error::ConfigParse {
			path: path.to_path_buf(),
			source,
		})
	}

	pub fn validate(&self) -> Result<()> {
		if !(0.0..=1.0).contains(&self.jitter) {
			return Err(Error::InvalidConfig(format!(
				"jitter must be within 0.0 and 1.0, got {}",
				self.jitter
			)));
		}
		if self.reference_domain.trim().is_empty() {
			return Err(Error::InvalidConfig("reference_domain is empty".to_string()));
		}
		if self.query_timeout_millis == 0 || self.ping_timeout_millis == 0 {
			return Err(Error::InvalidConfig("probe timeouts must be positive".to_string()));
		}
		Ok(())
	}

	pub fn interval(&self) -> Duration {
		Duration::from_secs(self.interval)
	}

	pub fn duration(&self) -> Option<Duration> {
		self.duration.map(Duration::from_secs)
	}

	pub fn analysis_interval(&self) -> Option<Duration> {
		match self.analysis_interval {
			0 => None,
			secs => Some(Duration::from_secs(secs)),
		}
	}

	pub fn query_timeout(&self) -> Duration {
		Duration::from_millis(self.query_timeout_millis)
	}

	pub fn ping_timeout(&self) -> Duration {
		Duration::from_millis(self.ping_timeout_millis)
	}
}
