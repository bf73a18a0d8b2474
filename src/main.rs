mod analysis;
mod cli;
mod config;
mod dns;
mod dnssec;
mod domains;
mod error;
mod log;
mod logging;
mod output;
mod ping;
mod probe;
mod resolver;
mod scheduler;
mod stats;
mod sweep;
mod transport;

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{AnalyzeArgs, Cli, Command, DnssecArgs, MeasureArgs, SweepArgs};
use crate::config::MeasureConfig;
use crate::log::LogWriter;
use crate::probe::NetworkProbe;
use crate::scheduler::StopReason;
use crate::sweep::{HickoryCheck, SweepOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	logging::init_logging();
	let cli = Cli::parse();

	match cli.command {
		Command::Measure(args) => measure(args).await,
		Command::Analyze(args) => analyze(args),
		Command::Dnssec(args) => check_dnssec(args).await,
		Command::Sweep(args) => sweep_domains(args).await,
	}
}

/// Cancel the returned token on the first Ctrl-C, exit on the second.
fn shutdown_on_ctrl_c() -> CancellationToken {
	let token = CancellationToken::new();
	let relay = scheduler::relay_interrupts(tokio::signal::ctrl_c, token.clone());
	tokio::spawn(async move {
		if relay.await {
			warn!("second interrupt received, exiting immediately");
			std::process::exit(130);
		}
	});
	token
}

async fn measure(args: MeasureArgs) -> anyhow::Result<()> {
	let mut config = match &args.config {
		Some(path) => MeasureConfig::from_file(path)?,
		None => MeasureConfig::default(),
	};
	args.apply(&mut config);
	config.validate()?;

	let servers = resolver::read_server_file(&config.servers_file)?;
	let domains = domains::read_domain_file(&config.domains_file)?;
	output::print_run_config(&servers, domains.len(), &config);

	let mut log = LogWriter::open(&config.output_file)?;
	let probe = NetworkProbe::new(config.query_timeout(), config.ping_timeout());
	let shutdown = shutdown_on_ctrl_c();

	let report = scheduler::run_measurements(&probe, &servers, &domains, &config, &mut log, &shutdown).await?;

	match report.stop {
		StopReason::NothingToMeasure => {
			println!("Nothing to measure: the server list or the domain list is empty.")
		}
		StopReason::Interrupted => println!("\nMeasurement interrupted by user."),
		StopReason::DurationElapsed => println!("\nMeasurement duration elapsed."),
		StopReason::TickLimit => println!("\nTick limit reached."),
	}
	println!(
		"{} ticks, {} records appended to {}",
		report.ticks,
		report.records,
		log.path().display(),
	);
	scheduler::report_summary(&log);
	Ok(())
}

fn analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
	let Some(records) = log::read_log(&args.input)? else {
		output::print_no_data();
		return Ok(());
	};
	let details = analysis::detailed_analysis(&records);
	if details.is_empty() {
		output::print_no_data();
		return Ok(());
	}
	output::print_detail_table(&details);
	if let Some(path) = &args.output {
		output::write_detail_csv(path, &details)
			.with_context(|| format!("failed to write '{}'", path.display()))?;
	}
	Ok(())
}

async fn check_dnssec(args: DnssecArgs) -> anyhow::Result<()> {
	let servers = resolver::read_server_file(&args.servers)?;
	let validating = dnssec::run_dnssec_checks(
		&servers,
		&args.domain,
		Duration::from_millis(args.timeout),
	)
	.await;
	println!("\n{}/{} servers validate DNSSEC.", validating.len(), servers.len());
	Ok(())
}

async fn sweep_domains(args: SweepArgs) -> anyhow::Result<()> {
	let servers = resolver::read_server_file(&args.servers)?;
	let pool = domains::read_domain_file(&args.domains)?;
	let checker = HickoryCheck::new(
		&servers,
		Duration::from_millis(args.timeout),
		Duration::from_millis(args.pause),
	);
	let options = SweepOptions {
		sample: args.sample,
		seed: args.seed,
	};
	let shutdown = shutdown_on_ctrl_c();

	let stats = sweep::run_sweep(
		&checker,
		&servers,
		&pool,
		&options,
		&args.output,
		&args.working,
		&shutdown,
	)
	.await?;
	if stats.interrupted {
		info!(tested = stats.tested, active = stats.active, "sweep interrupted");
	}
	Ok(())
}
