use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::MeasureConfig;

/// DNS latency measurement toolkit
#[derive(Parser, Debug)]
#[command(name = "dns-latency")]
#[command(about = "Sample ping and DNS query latency of resolvers into a CSV log")]
pub struct Cli {
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Periodically measure every server and append the results to a log
	Measure(MeasureArgs),
	/// Print detailed statistics of an existing log
	Analyze(AnalyzeArgs),
	/// Check which servers validate DNSSEC
	Dnssec(DnssecArgs),
	/// Check which domains resolve through each server
	Sweep(SweepArgs),
}

#[derive(Args, Debug, Default)]
pub struct MeasureArgs {
	/// TOML file with measurement settings; flags override its values
	#[arg(short = 'c', long = "config")]
	pub config: Option<PathBuf>,

	/// File containing DNS server addresses (one per line)
	#[arg(short = 'f', long = "servers")]
	pub servers: Option<PathBuf>,

	/// File containing the domain pool (one per line)
	#[arg(short = 'd', long = "domains")]
	pub domains: Option<PathBuf>,

	/// Output CSV log, appended to if it exists
	#[arg(short = 'o', long = "output")]
	pub output: Option<PathBuf>,

	/// Seconds between ticks
	#[arg(short = 'i', long = "interval")]
	pub interval: Option<u64>,

	/// Random perturbation of the interval, as a fraction of it
	#[arg(long = "jitter")]
	pub jitter: Option<f64>,

	/// Total run length in seconds (default: run until interrupted)
	#[arg(long = "duration")]
	pub duration: Option<u64>,

	/// Stop after this many ticks
	#[arg(short = 'n', long = "count")]
	pub count: Option<u64>,

	/// Seconds between periodic summaries, 0 to disable
	#[arg(long = "analysis-interval")]
	pub analysis_interval: Option<u64>,

	/// Domain queried on every tick as a baseline
	#[arg(long = "reference-domain")]
	pub reference_domain: Option<String>,

	/// DNS query timeout in milliseconds
	#[arg(long = "query-timeout")]
	pub query_timeout: Option<u64>,

	/// Ping timeout in milliseconds
	#[arg(long = "ping-timeout")]
	pub ping_timeout: Option<u64>,

	/// Disable ping measurement
	#[arg(long = "no-ping")]
	pub no_ping: bool,

	/// Disable DNS query measurement
	#[arg(long = "no-dns")]
	pub no_dns: bool,

	/// Random seed for reproducible domain selection
	#[arg(short = 's', long = "seed")]
	pub seed: Option<u64>,
}

impl MeasureArgs {
	/// Override `config` with every flag that was given.
	pub fn apply(&self, config: &mut MeasureConfig) {
		if let Some(path) = &self.servers {
			config.servers_file = path.clone();
		}
		if let Some(path) = &self.domains {
			config.domains_file = path.clone();
		}
		if let Some(path) = &self.output {
			config.output_file = path.clone();
		}
		if let Some(interval) = self.interval {
			config.interval = interval;
		}
		if let Some(jitter) = self.jitter {
			config.jitter = jitter;
		}
		if self.duration.is_some() {
			config.duration = self.duration;
		}
		if self.count.is_some() {
			config.max_ticks = self.count;
		}
		if let Some(secs) = self.analysis_interval {
			config.analysis_interval = secs;
		}
		if let Some(domain) = &self.reference_domain {
			config.reference_domain = domain.clone();
		}
		if let Some(ms) = self.query_timeout {
			config.query_timeout_millis = ms;
		}
		if let Some(ms) = self.ping_timeout {
			config.ping_timeout_millis = ms;
		}
		if self.no_ping {
			config.ping_enabled = false;
		}
		if self.no_dns {
			config.dns_query_enabled = false;
		}
		if self.seed.is_some() {
			config.seed = self.seed;
		}
	}
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
	/// Measurement log to analyze
	#[arg(short = 'i', long = "input", default_value = "dns_latency_results.csv")]
	pub input: PathBuf,

	/// Write the statistics table to this CSV file
	#[arg(short = 'o', long = "output")]
	pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DnssecArgs {
	/// File containing DNS server addresses (one per line)
	#[arg(short = 'f', long = "servers", default_value = "dns_servers.txt")]
	pub servers: PathBuf,

	/// Signed domain whose DNSKEY set is requested
	#[arg(long = "domain", default_value = crate::dnssec::DEFAULT_DNSSEC_DOMAIN)]
	pub domain: String,

	/// Query timeout in milliseconds
	#[arg(short = 't', long = "timeout", default_value = "5000")]
	pub timeout: u64,
}

#[derive(Args, Debug)]
pub struct SweepArgs {
	/// File containing DNS server addresses (one per line)
	#[arg(short = 'f', long = "servers", default_value = "dns_servers.txt")]
	pub servers: PathBuf,

	/// File containing the domains to check
	#[arg(short = 'd', long = "domains", default_value = "domains.txt")]
	pub domains: PathBuf,

	/// Active domains found so far; they are skipped and new ones appended
	#[arg(short = 'w', long = "working", default_value = "working_domains.txt")]
	pub working: PathBuf,

	/// Per-domain results CSV, appended to if it exists
	#[arg(short = 'o', long = "output", default_value = "dns_results.csv")]
	pub output: PathBuf,

	/// Number of random domains to test (default: all)
	#[arg(short = 'n', long = "sample")]
	pub sample: Option<usize>,

	/// Milliseconds to wait after each answered lookup
	#[arg(long = "pause", default_value = "0")]
	pub pause: u64,

	/// Lookup timeout in milliseconds
	#[arg(short = 't', long = "timeout", default_value = "5000")]
	pub timeout: u64,

	/// Random seed for reproducible sampling
	#[arg(short = 's', long = "seed")]
	pub seed: Option<u64>,
}
