//! The long-running sampling loop.
//!
//! Each tick picks one domain, measures every server against it and the
//! reference domain, appends one record per server, and then sleeps. The
//! loop is single threaded: analysis reads the log only between ticks, after
//! every record of the tick has been synced.

use std::future::Future;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analysis::basic_analysis;
use crate::config::MeasureConfig;
use crate::error::Result;
use crate::log::{LogWriter, MeasurementRecord};
use crate::output::{print_no_data, print_summary};
use crate::probe::Probe;
use crate::transport::{DnsServer, ProbeKind};

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
	/// Server list or domain pool is empty
	NothingToMeasure,
	DurationElapsed,
	TickLimit,
	Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
	pub ticks: u64,
	pub records: u64,
	pub stop: StopReason,
}

/// Wall-clock trigger for the periodic self-analysis.
///
/// The threshold advances in whole steps; steps missed while a tick overran
/// are skipped, so a slow tick causes at most one analysis.
#[derive(Debug, Clone)]
pub struct AnalysisTimer {
	every: Option<Duration>,
	next: Instant,
}

impl AnalysisTimer {
	/// A step too large to represent as an instant never fires.
	pub fn new(start: Instant, every: Option<Duration>) -> Self {
		match every.and_then(|every| start.checked_add(every)) {
			Some(next) => Self { every, next },
			None => Self { every: None, next: start },
		}
	}

	/// True if an analysis is due at `now`; advances the threshold when it is.
	pub fn fire(&mut self, now: Instant) -> bool {
		let Some(every) = self.every else {
			return false;
		};
		if now < self.next {
			return false;
		}
		while self.next <= now {
			match self.next.checked_add(every) {
				Some(next) => self.next = next,
				None => {
					self.every = None;
					break;
				}
			}
		}
		true
	}
}

/// `interval` perturbed by a uniform factor in `[-jitter, +jitter]`.
pub fn jittered_interval<R: Rng>(interval: Duration, jitter: f64, rng: &mut R) -> Duration {
	if jitter <= 0.0 || interval.is_zero() {
		return interval;
	}
	let factor = 1.0 + rng.gen_range(-jitter..=jitter);
	Duration::try_from_secs_f64(interval.as_secs_f64() * factor.max(0.0)).unwrap_or(interval)
}

/// Measure every server once against `domain` and append one record each.
async fn run_tick<P: Probe + ?Sized>(
	probe: &P,
	servers: &[DnsServer],
	domain: &str,
	config: &MeasureConfig,
	log: &mut LogWriter,
) -> Result<()> {
	for server in servers {
		let ping_latency = if config.ping_enabled {
			probe.measure(server, ProbeKind::Ping).await
		} else {
			None
		};

		let (reference_latency, domain_latency) = if config.dns_query_enabled {
			let reference = probe
				.measure(server, ProbeKind::Dns { domain: &config.reference_domain })
				.await;
			let chosen = probe.measure(server, ProbeKind::Dns { domain }).await;
			(reference, chosen)
		} else {
			(None, None)
		};

		let record = MeasurementRecord::now(
			&server.label,
			ping_latency,
			reference_latency,
			domain_latency,
			domain,
		);
		log.append(&record)?;
		debug!(
			server = %server.label,
			domain,
			ping = ?record.ping_latency,
			reference = ?record.reference_query_latency,
			query = ?record.domain_query_latency,
			"record appended"
		);
	}
	Ok(())
}

/// Print the summary of the log, never failing the run.
pub fn report_summary(log: &LogWriter) {
	match basic_analysis(log.path()) {
		Ok(Some(summary)) => print_summary(&summary),
		Ok(None) => print_no_data(),
		Err(e) => warn!(error = %e, "analysis failed"),
	}
}

/// Cancel `shutdown` on the first interrupt and wait for a second one.
///
/// Returns true once a second interrupt arrives while the current tick is
/// still finishing, false if listening for interrupts fails.
pub async fn relay_interrupts<F, Fut>(mut next_interrupt: F, shutdown: CancellationToken) -> bool
where
	F: FnMut() -> Fut,
	Fut: Future<Output = std::io::Result<()>>,
{
	if let Err(e) = next_interrupt().await {
		warn!(error = %e, "failed to listen for interrupts");
		return false;
	}
	info!("interrupt received, stopping after the current tick");
	shutdown.cancel();

	match next_interrupt().await {
		Ok(()) => true,
		Err(e) => {
			warn!(error = %e, "failed to listen for interrupts");
			false
		}
	}
}

/// Run the sampling loop until the duration elapses, the tick limit is hit
/// or `shutdown` is cancelled.
///
/// Cancellation is honoured at the top of a tick and during the sleep; a
/// tick that has started always completes. Only log errors abort the run.
pub async fn run_measurements<P: Probe + ?Sized>(
	probe: &P,
	servers: &[DnsServer],
	domains: &[String],
	config: &MeasureConfig,
	log: &mut LogWriter,
	shutdown: &CancellationToken,
) -> Result<RunReport> {
	let mut report = RunReport {
		ticks: 0,
		records: 0,
		stop: StopReason::NothingToMeasure,
	};
	if servers.is_empty() || domains.is_empty() {
		warn!(
			servers = servers.len(),
			domains = domains.len(),
			"nothing to measure"
		);
		return Ok(report);
	}

	let mut rng = match config.seed {
		Some(seed) => StdRng::seed_from_u64(seed),
		None => StdRng::from_entropy(),
	};

	let start = Instant::now();
	// Beyond the representable range the run is unbounded
	let deadline = config.duration().and_then(|d| start.checked_add(d));
	let mut analysis = AnalysisTimer::new(start, config.analysis_interval());
	let appended_before = log.appended();

	report.stop = loop {
		if shutdown.is_cancelled() {
			break StopReason::Interrupted;
		}
		if deadline.is_some_and(|d| Instant::now() >= d) {
			break StopReason::DurationElapsed;
		}

		let Some(domain) = domains.choose(&mut rng) else {
			break StopReason::NothingToMeasure;
		};
		info!(tick = report.ticks + 1, domain = %domain, servers = servers.len(), "measurement started");
		run_tick(probe, servers, domain, config, log).await?;
		report.ticks += 1;

		if analysis.fire(Instant::now()) {
			info!("running periodic analysis");
			report_summary(log);
		}

		if config.max_ticks.is_some_and(|max| report.ticks >= max) {
			break StopReason::TickLimit;
		}

		let mut pause = jittered_interval(config.interval(), config.jitter, &mut rng);
		if let Some(deadline) = deadline {
			let remaining = deadline.saturating_duration_since(Instant::now());
			if remaining.is_zero() {
				break StopReason::DurationElapsed;
			}
			pause = pause.min(remaining);
		}
		debug!(?pause, "sleeping until next tick");

		tokio::select! {
			_ = tokio::time::sleep(pause) => {}
			_ = shutdown.cancelled() => break StopReason::Interrupted,
		}
	};

	report.records = log.appended() - appended_before;
	info!(ticks = report.ticks, records = report.records, stop = ?report.stop, "measurement stopped");
	Ok(report)
}
