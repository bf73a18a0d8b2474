use std::path::Path;

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

use anyhow::Result;

use crate::analysis::{LatencyField, ServerDetail, Summary};
use crate::config::MeasureConfig;
use crate::log::TIMESTAMP_FORMAT;
use crate::sweep::{format_elapsed, SweepStats};
use crate::transport::DnsServer;

const NO_SAMPLES: &str = "no valid samples";

fn seconds(value: Option<f64>) -> String {
	match value {
		Some(v) => format!("{:.4}", v),
		None => NO_SAMPLES.to_string(),
	}
}

fn csv_seconds(value: Option<f64>) -> String {
	match value {
		Some(v) => format!("{:.6}", v),
		None => "nan".to_string(),
	}
}

fn new_table() -> Table {
	let mut table = Table::new();
	table.load_preset(UTF8_FULL);
	table.set_content_arrangement(ContentArrangement::Dynamic);
	table
}

/// Print the measurement settings before the loop starts.
pub fn print_run_config(servers: &[DnsServer], domain_count: usize, config: &MeasureConfig) {
	println!("DNS Latency Measurement");
	println!("=======================");
	println!("Servers:            {}", servers.len());
	for s in servers {
		println!("  - {} ({})", s.label, s.addr);
	}
	println!("Domains:            {}", domain_count);
	println!("Reference domain:   {}", config.reference_domain);
	println!("Interval:           {} s (jitter {:.0}%)", config.interval, config.jitter * 100.0);
	match config.duration {
		Some(secs) => println!("Duration:           {} s", secs),
		None => println!("Duration:           unbounded"),
	}
	if let Some(ticks) = config.max_ticks {
		println!("Tick limit:         {}", ticks);
	}
	match config.analysis_interval() {
		Some(every) => println!("Analysis interval:  {} s", every.as_secs()),
		None => println!("Analysis interval:  disabled"),
	}
	let yes_no = |b: bool| if b { "yes" } else { "no" };
	println!("Ping:               {}", yes_no(config.ping_enabled));
	println!("DNS queries:        {}", yes_no(config.dns_query_enabled));
	println!("Output:             {}", config.output_file.display());
	if let Some(seed) = config.seed {
		println!("Seed:               {}", seed);
	}
	println!();
}

pub fn print_no_data() {
	println!("No data available for analysis.");
}

/// Print mean latencies and failure counts per server.
pub fn print_summary(summary: &Summary) {
	let mut means = new_table();
	means.set_header(vec!["Server", "Ping", "Reference query", "Domain query"]);
	let mut failures = new_table();
	failures.set_header(vec!["Server", "Ping", "Reference query", "Domain query", "Samples"]);

	for (server, stats) in &summary.servers {
		let mut mean_row = vec![server.clone()];
		let mut failure_row = vec![server.clone()];
		for field in LatencyField::ALL {
			let f = stats.field(field);
			mean_row.push(seconds(f.mean()));
			failure_row.push(f.unmeasurable_count.to_string());
		}
		failure_row.push(stats.ping.total().to_string());
		means.add_row(mean_row);
		failures.add_row(failure_row);
	}

	println!("\nBasic Statistics (Average Latency in Seconds, {} records):", summary.records);
	println!("{means}");
	println!("\nNumber of Failed Pings/Queries:");
	println!("{failures}");
}

/// Print the detailed per-server statistics table.
pub fn print_detail_table(details: &[ServerDetail]) {
	let mut table = new_table();
	let mut header = vec!["Server".to_string(), "Samples".to_string()];
	for field in LatencyField::ALL {
		let name = field.column();
		header.push(format!("{name} mean"));
		header.push(format!("{name} median"));
		header.push(format!("{name} std"));
		header.push(format!("{name} p95"));
		header.push(format!("{name} failed"));
	}
	header.extend(["Aggregate mean", "Aggregate median", "Aggregate std"].map(String::from));
	table.set_header(header);

	for d in details {
		let mut row = vec![d.server.clone(), d.fields[0].samples.to_string()];
		for field in LatencyField::ALL {
			let f = d.field(field);
			row.push(seconds(f.mean));
			row.push(seconds(f.median));
			row.push(seconds(f.stddev));
			row.push(seconds(f.p95));
			row.push(f.failures.to_string());
		}
		row.push(seconds(d.aggregate_mean));
		row.push(seconds(d.aggregate_median));
		row.push(seconds(d.aggregate_stddev));
		table.add_row(row);
	}

	println!("\nLatency Statistics by Server (seconds)");
	println!("======================================\n");
	println!("{table}");
	for d in details {
		println!(
			"  {}: {} .. {}",
			d.server,
			d.first_seen.format(TIMESTAMP_FORMAT),
			d.last_seen.format(TIMESTAMP_FORMAT),
		);
	}
}

/// Write the detailed statistics to a CSV file, replacing it.
pub fn write_detail_csv(path: &Path, details: &[ServerDetail]) -> Result<()> {
	let mut writer = csv::Writer::from_path(path)?;

	let mut header = vec![
		"server".to_string(),
		"first_seen".to_string(),
		"last_seen".to_string(),
		"samples".to_string(),
	];
	for field in LatencyField::ALL {
		let name = field.column();
		for stat in ["mean", "median", "std", "p95", "failed"] {
			header.push(format!("{name}_{stat}"));
		}
	}
	header.extend(["aggregate_mean", "aggregate_median", "aggregate_std"].map(String::from));
	writer.write_record(&header)?;

	for d in details {
		let mut row = vec![
			d.server.clone(),
			d.first_seen.format(TIMESTAMP_FORMAT).to_string(),
			d.last_seen.format(TIMESTAMP_FORMAT).to_string(),
			d.fields[0].samples.to_string(),
		];
		for field in LatencyField::ALL {
			let f = d.field(field);
			row.push(csv_seconds(f.mean));
			row.push(csv_seconds(f.median));
			row.push(csv_seconds(f.stddev));
			row.push(csv_seconds(f.p95));
			row.push(f.failures.to_string());
		}
		row.push(csv_seconds(d.aggregate_mean));
		row.push(csv_seconds(d.aggregate_median));
		row.push(csv_seconds(d.aggregate_stddev));
		writer.write_record(&row)?;
	}

	writer.flush()?;
	println!("\nStatistics written to: {}", path.display());
	Ok(())
}

/// Print the closing statistics of a domain sweep.
pub fn print_sweep_stats(stats: &SweepStats) {
	let duration = (stats.finished - stats.started).to_std().unwrap_or_default();
	println!("\nFinal Statistics:");
	println!("Start of the test: {}", stats.started.format(TIMESTAMP_FORMAT));
	println!("End of the test: {}", stats.finished.format(TIMESTAMP_FORMAT));
	println!("Duration of the test: {}", format_elapsed(duration));
	println!(
		"Domains tested: {} (randomly picked domains from total of {} domains)",
		stats.tested, stats.pool_size,
	);
	println!("Active domains: {} (resolved by at least one of the DNS servers)", stats.active);

	let mut table = new_table();
	table.set_header(vec!["DNS server", "Resolved", "Blocked"]);
	for (label, resolved) in &stats.resolved {
		table.add_row(vec![
			label.clone(),
			resolved.to_string(),
			stats.blocked(*resolved).to_string(),
		]);
	}
	println!("\nDNS Servers Stats:");
	println!("{table}");
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;

	use crate::analysis::detailed_analysis;
	use crate::log::MeasurementRecord;

	#[test]
	fn test_seconds_never_renders_missing_as_zero() {
		assert_eq!(seconds(None), "no valid samples");
		assert_eq!(seconds(Some(0.0)), "0.0000");
		assert_eq!(csv_seconds(None), "nan");
	}

	#[test]
	fn test_write_detail_csv() {
		let records = vec![
			MeasurementRecord::now("1.1.1.1", Some(Duration::from_millis(10)), None, None, "example.com"),
			MeasurementRecord::now("1.1.1.1", Some(Duration::from_millis(30)), None, None, "example.com"),
		];
		let details = detailed_analysis(&records);
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("summary.csv");

		write_detail_csv(&path, &details).unwrap();

		let content = std::fs::read_to_string(&path).unwrap();
		let lines: Vec<&str> = content.lines().collect();
		assert_eq!(lines.len(), 2);
		assert!(lines[0].starts_with("server,first_seen,last_seen,samples,ping_latency_mean,"));
		let cells: Vec<&str> = lines[1].split(',').collect();
		assert_eq!(cells[0], "1.1.1.1");
		assert_eq!(cells[3], "2");
		assert_eq!(cells[4], "0.020000");
		// reference latency column has no samples
		assert_eq!(cells[9], "nan");
		assert_eq!(cells[13], "2");
	}
}
