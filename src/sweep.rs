//! One-shot sweep of a domain list through every server.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::Resolver;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::log::CsvAppender;
use crate::output::print_sweep_stats;
use crate::transport::DnsServer;

type TokioResolver = Resolver<TokioConnectionProvider>;

/// Whether a server resolves a domain to a usable address.
#[async_trait]
pub trait Resolvability: Send + Sync {
	async fn resolves(&self, server: &DnsServer, domain: &str) -> bool;
}

/// Resolves through one uncached hickory resolver per server.
pub struct HickoryCheck {
	resolvers: Vec<(String, TokioResolver)>,
	pause: Duration,
}

impl HickoryCheck {
	/// `pause` is waited after every answered lookup.
	pub fn new(servers: &[DnsServer], timeout: Duration, pause: Duration) -> Self {
		let resolvers = servers.iter()
			.map(|server| (server.label.clone(), build_resolver(server, timeout)))
			.collect();
		Self { resolvers, pause }
	}
}

fn build_resolver(server: &DnsServer, timeout: Duration) -> TokioResolver {
	let group = NameServerConfigGroup::from_ips_clear(&[server.addr.ip()], server.addr.port(), true);
	let config = ResolverConfig::from_parts(None, vec![], group);

	let mut options = ResolverOpts::default();
	options.cache_size = 0;
	options.timeout = timeout;
	options.attempts = 1;

	Resolver::builder_with_config(config, TokioConnectionProvider::default())
		.with_options(options)
		.build()
}

#[async_trait]
impl Resolvability for HickoryCheck {
	async fn resolves(&self, server: &DnsServer, domain: &str) -> bool {
		let Some((_, resolver)) = self.resolvers.iter().find(|(label, _)| *label == server.label) else {
			return false;
		};
		match resolver.ipv4_lookup(domain).await {
			Ok(lookup) => {
				if !self.pause.is_zero() {
					tokio::time::sleep(self.pause).await;
				}
				// Blocking resolvers answer with the unspecified address
				lookup.iter().next().is_some_and(|a| a.0 != Ipv4Addr::UNSPECIFIED)
			}
			Err(e) => {
				debug!(server = %server.label, domain, error = %e, "lookup failed");
				false
			}
		}
	}
}

#[derive(Debug, Clone)]
pub struct SweepOptions {
	/// Number of domains to draw from the pool, all when absent
	pub sample: Option<usize>,
	pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SweepStats {
	pub started: DateTime<Local>,
	pub finished: DateTime<Local>,
	pub pool_size: usize,
	/// Domains drawn for this sweep
	pub tested: usize,
	/// Domains resolved by at least one server
	pub active: usize,
	/// Resolved count per server, in server list order
	pub resolved: Vec<(String, usize)>,
	pub interrupted: bool,
}

impl SweepStats {
	/// Active domains the server failed to resolve
	pub fn blocked(&self, resolved: usize) -> usize {
		self.active.saturating_sub(resolved)
	}
}

/// Domains already confirmed active by a previous sweep.
pub fn load_processed(path: &Path) -> Result<HashSet<String>> {
	match std::fs::read_to_string(path) {
		Ok(content) => Ok(content.lines()
			.map(|l| l.trim().to_string())
			.filter(|l| !l.is_empty())
			.collect()),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashSet::new()),
		Err(e) => Err(e).with_context(|| format!("failed to read '{}'", path.display())),
	}
}

fn append_working(path: &Path, domain: &str) -> Result<()> {
	let mut file = OpenOptions::new()
		.create(true)
		.append(true)
		.open(path)
		.with_context(|| format!("failed to open '{}'", path.display()))?;
	writeln!(file, "{}", domain)?;
	file.flush()?;
	Ok(())
}

/// Format like `H:MM:SS`.
pub fn format_elapsed(d: Duration) -> String {
	let secs = d.as_secs();
	format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

/// Resolve a random sample of `pool` through every server.
///
/// Appends one `True`/`False` row per domain to `output` and every active
/// domain to `working`. Domains already in `working` are skipped. Stops
/// between domains when `shutdown` is cancelled.
pub async fn run_sweep<C: Resolvability + ?Sized>(
	checker: &C,
	servers: &[DnsServer],
	pool: &[String],
	options: &SweepOptions,
	output: &Path,
	working: &Path,
	shutdown: &CancellationToken,
) -> Result<SweepStats> {
	let mut processed = load_processed(working)?;

	let mut rng = match options.seed {
		Some(seed) => StdRng::seed_from_u64(seed),
		None => StdRng::from_entropy(),
	};
	let amount = options.sample.unwrap_or(pool.len()).min(pool.len());
	let domains: Vec<&String> = pool.choose_multiple(&mut rng, amount).collect();

	let mut header = vec!["Domain"];
	header.extend(servers.iter().map(|s| s.label.as_str()));
	let mut csv = CsvAppender::open(output, &header)?;

	let mut stats = SweepStats {
		started: Local::now(),
		finished: Local::now(),
		pool_size: pool.len(),
		tested: domains.len(),
		active: 0,
		resolved: servers.iter().map(|s| (s.label.clone(), 0)).collect(),
		interrupted: false,
	};
	let clock = Instant::now();

	for (index, domain) in domains.iter().enumerate() {
		let completed = index + 1;
		if shutdown.is_cancelled() {
			println!("\nProcess interrupted by user.");
			stats.interrupted = true;
			break;
		}
		if processed.contains(domain.as_str()) {
			println!("Domain '{}' already processed. Skipping...", domain);
			continue;
		}

		let mut row = vec![domain.to_string()];
		let mut domain_resolved = false;
		for (server, tally) in servers.iter().zip(stats.resolved.iter_mut()) {
			let resolved = checker.resolves(server, domain).await;
			row.push(if resolved { "True" } else { "False" }.to_string());
			if resolved {
				tally.1 += 1;
				domain_resolved = true;
			}
		}

		if domain_resolved {
			stats.active += 1;
			append_working(working, domain)?;
			processed.insert(domain.to_string());
		}
		csv.append_row(&row)?;

		let remaining = domains.len() - completed;
		let eta = clock.elapsed().div_f64(completed as f64).mul_f64(remaining as f64);
		println!(
			"Tested {}/{} domains. Remaining: {} domains. Estimated time left: {} Domain: '{}' was {}.",
			completed,
			domains.len(),
			remaining,
			format_elapsed(eta),
			domain,
			if domain_resolved { "RESOLVED" } else { "not resolved" },
		);

		if completed % 10 == 0 {
			println!("\n{}", "=".repeat(50));
			println!("Intermediate DNS Servers Stats:");
			for (label, resolved) in &stats.resolved {
				println!(
					"{}: {} domains RESOLVED, {} domains BLOCKED",
					label, resolved, stats.blocked(*resolved),
				);
			}
			println!("{}\n", "=".repeat(50));
		}
	}

	stats.finished = Local::now();
	print_sweep_stats(&stats);
	Ok(stats)
}
