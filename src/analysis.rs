//! Read-only summaries of a measurement log.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::log::{read_log, MeasurementRecord};
use crate::stats::{mean, median, percentile, sample_stddev, sort_values};

/// The three latency columns of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyField {
	Ping,
	Reference,
	Domain,
}

impl LatencyField {
	pub const ALL: [LatencyField; 3] = [LatencyField::Ping, LatencyField::Reference, LatencyField::Domain];

	/// Column name in the log
	pub fn column(self) -> &'static str {
		match self {
			LatencyField::Ping => "ping_latency",
			LatencyField::Reference => "google_query_latency",
			LatencyField::Domain => "domain_query_latency",
		}
	}

	pub fn get(self, record: &MeasurementRecord) -> Option<Duration> {
		match self {
			LatencyField::Ping => record.ping_latency,
			LatencyField::Reference => record.reference_query_latency,
			LatencyField::Domain => record.domain_query_latency,
		}
	}
}

/// Running counts for one latency field of one server
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldStats {
	pub resolved_count: usize,
	pub unmeasurable_count: usize,
	total_secs: f64,
}

impl FieldStats {
	fn add(&mut self, latency: Option<Duration>) {
		match latency {
			Some(d) => {
				self.resolved_count += 1;
				self.total_secs += d.as_secs_f64();
			}
			None => self.unmeasurable_count += 1,
		}
	}

	/// Mean latency in seconds; `None` when there are no valid samples.
	pub fn mean(&self) -> Option<f64> {
		if self.resolved_count == 0 {
			return None;
		}
		Some(self.total_secs / self.resolved_count as f64)
	}

	pub fn total(&self) -> usize {
		self.resolved_count + self.unmeasurable_count
	}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerStats {
	pub ping: FieldStats,
	pub reference: FieldStats,
	pub domain: FieldStats,
}

impl ServerStats {
	pub fn field(&self, field: LatencyField) -> &FieldStats {
		match field {
			LatencyField::Ping => &self.ping,
			LatencyField::Reference => &self.reference,
			LatencyField::Domain => &self.domain,
		}
	}
}

/// Per-server mean latency and failure counts, ordered by server
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
	pub records: usize,
	pub servers: BTreeMap<String, ServerStats>,
}

pub fn summarize(records: &[MeasurementRecord]) -> Summary {
	let mut summary = Summary {
		records: records.len(),
		..Default::default()
	};
	for record in records {
		let entry = summary.servers.entry(record.server.clone()).or_default();
		entry.ping.add(record.ping_latency);
		entry.reference.add(record.reference_query_latency);
		entry.domain.add(record.domain_query_latency);
	}
	summary
}

/// Re-read the log and summarize it. `None` means there is no data.
pub fn basic_analysis(path: impl AsRef<Path>) -> Result<Option<Summary>> {
	Ok(read_log(path)?.map(|records| summarize(&records)))
}

/// Distribution of one latency field of one server, in seconds
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDetail {
	pub samples: usize,
	pub failures: usize,
	pub mean: Option<f64>,
	pub median: Option<f64>,
	pub stddev: Option<f64>,
	pub p95: Option<f64>,
}

impl FieldDetail {
	fn from_latencies(latencies: &[Option<Duration>]) -> Self {
		let mut values: Vec<f64> = latencies.iter()
			.flatten()
			.map(Duration::as_secs_f64)
			.collect();
		sort_values(&mut values);
		Self {
			samples: latencies.len(),
			failures: latencies.len() - values.len(),
			mean: mean(&values),
			median: median(&values),
			stddev: sample_stddev(&values),
			p95: percentile(&values, 95.0),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerDetail {
	pub server: String,
	pub first_seen: NaiveDateTime,
	pub last_seen: NaiveDateTime,
	/// Indexed in the order of `LatencyField::ALL`
	pub fields: [FieldDetail; 3],
	/// Mean of the per-field means, skipping fields without samples
	pub aggregate_mean: Option<f64>,
	pub aggregate_median: Option<f64>,
	pub aggregate_stddev: Option<f64>,
}

impl ServerDetail {
	pub fn field(&self, field: LatencyField) -> &FieldDetail {
		let idx = LatencyField::ALL.iter().position(|f| *f == field).unwrap_or(0);
		&self.fields[idx]
	}
}

fn mean_of(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
	let present: Vec<f64> = values.flatten().collect();
	mean(&present)
}

/// Per-server distribution statistics over the whole log, ordered by server.
pub fn detailed_analysis(records: &[MeasurementRecord]) -> Vec<ServerDetail> {
	let mut grouped: BTreeMap<&str, Vec<&MeasurementRecord>> = BTreeMap::new();
	for record in records {
		grouped.entry(record.server.as_str()).or_default().push(record);
	}

	grouped.into_iter()
		.filter_map(|(server, rows)| {
			let first_seen = rows.iter().map(|r| r.timestamp).min()?;
			let last_seen = rows.iter().map(|r| r.timestamp).max()?;
			let fields = LatencyField::ALL.map(|field| {
				let latencies: Vec<Option<Duration>> = rows.iter().map(|r| field.get(r)).collect();
				FieldDetail::from_latencies(&latencies)
			});
			Some(ServerDetail {
				server: server.to_string(),
				first_seen,
				last_seen,
				aggregate_mean: mean_of(fields.iter().map(|f| f.mean)),
				aggregate_median: mean_of(fields.iter().map(|f| f.median)),
				aggregate_stddev: mean_of(fields.iter().map(|f| f.stddev)),
				fields,
			})
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::log::LogWriter;

	fn ts(s: &str) -> NaiveDateTime {
		NaiveDateTime::parse_from_str(s, crate::log::TIMESTAMP_FORMAT).unwrap()
	}

	fn rec(at: &str, server: &str, ping: Option<u64>, reference: Option<u64>, domain: Option<u64>) -> MeasurementRecord {
		MeasurementRecord {
			timestamp: ts(at),
			server: server.to_string(),
			ping_latency: ping.map(Duration::from_millis),
			reference_query_latency: reference.map(Duration::from_millis),
			domain_query_latency: domain.map(Duration::from_millis),
			domain: "example.com".to_string(),
		}
	}

	#[test]
	fn test_summarize_groups_by_server() {
		let records = vec![
			rec("2024-05-01 10:00:00", "8.8.8.8", Some(10), Some(20), None),
			rec("2024-05-01 10:00:01", "1.1.1.1", Some(5), None, Some(40)),
			rec("2024-05-01 10:01:00", "8.8.8.8", Some(30), Some(40), Some(60)),
		];
		let summary = summarize(&records);
		assert_eq!(summary.records, 3);

		let servers: Vec<&str> = summary.servers.keys().map(String::as_str).collect();
		assert_eq!(servers, vec!["1.1.1.1", "8.8.8.8"]);

		let google = &summary.servers["8.8.8.8"];
		assert!((google.ping.mean().unwrap() - 0.02).abs() < 1e-9);
		assert_eq!(google.domain.resolved_count, 1);
		assert_eq!(google.domain.unmeasurable_count, 1);
		assert_eq!(summary.servers["1.1.1.1"].reference.unmeasurable_count, 1);
	}

	#[test]
	fn test_all_unmeasurable_has_no_mean() {
		let records = vec![
			rec("2024-05-01 10:00:00", "10.0.0.1", None, None, None),
			rec("2024-05-01 10:01:00", "10.0.0.1", None, None, None),
		];
		let stats = &summarize(&records).servers["10.0.0.1"];
		for field in LatencyField::ALL {
			let f = stats.field(field);
			assert_eq!(f.mean(), None);
			assert_eq!(f.unmeasurable_count, f.total());
			assert_eq!(f.total(), 2);
		}
	}

	#[test]
	fn test_zero_latency_counts_as_sample() {
		let records = vec![rec("2024-05-01 10:00:00", "1.1.1.1", Some(0), None, None)];
		let stats = &summarize(&records).servers["1.1.1.1"];
		assert_eq!(stats.ping.mean(), Some(0.0));
		assert_eq!(stats.ping.unmeasurable_count, 0);
	}

	#[test]
	fn test_basic_analysis_no_data() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("results.csv");
		assert_eq!(basic_analysis(&path).unwrap(), None);

		LogWriter::open(&path).unwrap();
		assert_eq!(basic_analysis(&path).unwrap(), None);
	}

	#[test]
	fn test_basic_analysis_is_read_only() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("results.csv");
		let mut log = LogWriter::open(&path).unwrap();
		log.append(&rec("2024-05-01 10:00:00", "1.1.1.1", Some(5), Some(6), None)).unwrap();
		log.append(&rec("2024-05-01 10:00:01", "8.8.8.8", None, Some(9), Some(7))).unwrap();
		let before = std::fs::read(&path).unwrap();

		for _ in 0..3 {
			let summary = basic_analysis(&path).unwrap().unwrap();
			assert_eq!(summary.records, 2);
		}
		assert_eq!(std::fs::read(&path).unwrap(), before);
	}

	#[test]
	fn test_basic_analysis_reads_legacy_none() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("results.csv");
		std::fs::write(
			&path,
			"timestamp,server,ping_latency,google_query_latency,domain_query_latency,domain\n\
			 2024-05-01 10:00:00,1.1.1.1,None,0.02,nan,example.com\n",
		)
		.unwrap();

		let summary = basic_analysis(&path).unwrap().unwrap();
		let stats = &summary.servers["1.1.1.1"];
		assert_eq!(stats.ping.unmeasurable_count, 1);
		assert_eq!(stats.reference.resolved_count, 1);
		assert_eq!(stats.domain.mean(), None);
	}

	#[test]
	fn test_detailed_analysis() {
		let records = vec![
			rec("2024-05-01 10:02:00", "1.1.1.1", Some(10), Some(20), None),
			rec("2024-05-01 10:00:00", "1.1.1.1", Some(30), Some(40), None),
			rec("2024-05-01 10:01:00", "1.1.1.1", None, Some(60), None),
		];
		let details = detailed_analysis(&records);
		assert_eq!(details.len(), 1);
		let d = &details[0];
		assert_eq!(d.first_seen, ts("2024-05-01 10:00:00"));
		assert_eq!(d.last_seen, ts("2024-05-01 10:02:00"));

		let ping = d.field(LatencyField::Ping);
		assert_eq!(ping.samples, 3);
		assert_eq!(ping.failures, 1);
		assert!((ping.mean.unwrap() - 0.02).abs() < 1e-9);
		assert!((ping.median.unwrap() - 0.02).abs() < 1e-9);

		let reference = d.field(LatencyField::Reference);
		assert!((reference.median.unwrap() - 0.04).abs() < 1e-9);
		assert!((reference.stddev.unwrap() - 0.02).abs() < 1e-9);

		let domain = d.field(LatencyField::Domain);
		assert_eq!(domain.failures, 3);
		assert_eq!(domain.mean, None);

		// Aggregate skips the domain column, which has no samples
		assert!((d.aggregate_mean.unwrap() - 0.03).abs() < 1e-9);
	}
}
