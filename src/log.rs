//! Append-only CSV files: the measurement log and its reader.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDateTime, Timelike};
use tracing::warn;

use crate::error::{Error, Result};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column order of the measurement log
pub const LOG_HEADER: [&str; 6] = [
	"timestamp",
	"server",
	"ping_latency",
	"google_query_latency",
	"domain_query_latency",
	"domain",
];

/// One row of the measurement log
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
	pub timestamp: NaiveDateTime,
	pub server: String,
	pub ping_latency: Option<Duration>,
	pub reference_query_latency: Option<Duration>,
	pub domain_query_latency: Option<Duration>,
	pub domain: String,
}

impl MeasurementRecord {
	/// Build a record stamped with the current local time, truncated to seconds.
	pub fn now(
		server: &str,
		ping_latency: Option<Duration>,
		reference_query_latency: Option<Duration>,
		domain_query_latency: Option<Duration>,
		domain: &str,
	) -> Self {
		let now = Local::now().naive_local();
		let timestamp = now.with_nanosecond(0).unwrap_or(now);
		Self {
			timestamp,
			server: server.to_string(),
			ping_latency,
			reference_query_latency,
			domain_query_latency,
			domain: domain.to_string(),
		}
	}

	fn to_row(&self) -> [String; 6] {
		[
			self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
			self.server.clone(),
			format_latency(self.ping_latency),
			format_latency(self.reference_query_latency),
			format_latency(self.domain_query_latency),
			self.domain.clone(),
		]
	}

	fn from_row(row: &csv::StringRecord) -> Option<Self> {
		if row.len() != LOG_HEADER.len() {
			return None;
		}
		let timestamp = NaiveDateTime::parse_from_str(row.get(0)?, TIMESTAMP_FORMAT).ok()?;
		Some(Self {
			timestamp,
			server: row.get(1)?.to_string(),
			ping_latency: parse_latency(row.get(2)?)?,
			reference_query_latency: parse_latency(row.get(3)?)?,
			domain_query_latency: parse_latency(row.get(4)?)?,
			domain: row.get(5)?.to_string(),
		})
	}
}

/// Seconds in shortest round-trip form, `nan` when unmeasurable.
pub fn format_latency(latency: Option<Duration>) -> String {
	match latency {
		Some(d) => format!("{}", d.as_secs_f64()),
		None => "nan".to_string(),
	}
}

/// Parse a latency field.
///
/// The outer `None` means the field is malformed; `Some(None)` is an
/// explicitly absent latency. Logs written by older tools used `None` for
/// disabled probes, so that spelling is accepted too.
pub fn parse_latency(field: &str) -> Option<Option<Duration>> {
	let field = field.trim();
	if field.is_empty() || field.eq_ignore_ascii_case("nan") || field == "None" {
		return Some(None);
	}
	let secs: f64 = field.parse().ok()?;
	if secs.is_nan() {
		return Some(None);
	}
	Duration::try_from_secs_f64(secs).ok().map(Some)
}

/// A CSV file opened for appending with a header written only on creation.
///
/// Every row is flushed and synced to disk before `append_row` returns.
pub struct CsvAppender {
	path: PathBuf,
	writer: csv::Writer<File>,
}

impl CsvAppender {
	pub fn open(path: impl AsRef<Path>, header: &[&str]) -> Result<Self> {
		let path = path.as_ref().to_path_buf();
		let open_err = |source: io::Error| Error::LogOpen {
			path: path.clone(),
			source,
		};

		let mut file = OpenOptions::new()
			.read(true)
			.append(true)
			.create(true)
			.open(&path)
			.map_err(open_err)?;
		let len = file.metadata().map_err(open_err)?.len();

		if len > 0 {
			terminate_partial_line(&mut file).map_err(open_err)?;
			check_header(&path, header);
		}

		let writer = csv::WriterBuilder::new()
			.has_headers(false)
			.from_writer(file);
		let mut appender = Self { path, writer };
		if len == 0 {
			appender.append_row(header)?;
		}
		Ok(appender)
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn append_row<I, T>(&mut self, row: I) -> Result<()>
	where
		I: IntoIterator<Item = T>,
		T: AsRef<[u8]>,
	{
		self.write_synced(row).map_err(|source| Error::LogAppend {
			path: self.path.clone(),
			source,
		})
	}

	fn write_synced<I, T>(&mut self, row: I) -> io::Result<()>
	where
		I: IntoIterator<Item = T>,
		T: AsRef<[u8]>,
	{
		self.writer.write_record(row)?;
		self.writer.flush()?;
		self.writer.get_ref().sync_data()
	}
}

/// If a previous process died mid-row, end that row so new records start clean.
fn terminate_partial_line(file: &mut File) -> io::Result<()> {
	file.seek(SeekFrom::End(-1))?;
	let mut last = [0u8; 1];
	file.read_exact(&mut last)?;
	if last[0] != b'\n' {
		// Append mode: the write lands at the end regardless of the cursor
		file.write_all(b"\n")?;
		file.sync_data()?;
	}
	Ok(())
}

fn check_header(path: &Path, expected: &[&str]) {
	let mut first = String::new();
	let read = File::open(path).and_then(|f| BufReader::new(f).read_line(&mut first));
	if read.is_ok() && first.trim_end() != expected.join(",") {
		warn!(
			path = %path.display(),
			found = first.trim_end(),
			"existing file has an unexpected header, appending anyway"
		);
	}
}

/// Sole owner of the measurement log for the lifetime of a run.
pub struct LogWriter {
	inner: CsvAppender,
	appended: u64,
}

impl LogWriter {
	/// Create the log with its header if absent or empty, else open for append.
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		Ok(Self {
			inner: CsvAppender::open(path, &LOG_HEADER)?,
			appended: 0,
		})
	}

	pub fn append(&mut self, record: &MeasurementRecord) -> Result<()> {
		self.inner.append_row(record.to_row())?;
		self.appended += 1;
		Ok(())
	}

	pub fn path(&self) -> &Path {
		self.inner.path()
	}

	/// Records appended through this handle
	pub fn appended(&self) -> u64 {
		self.appended
	}
}

#[cfg(test)]
impl LogWriter {
	/// Writer on an existing file or device, without header handling.
	pub(crate) fn raw(path: impl AsRef<Path>) -> Self {
		let path = path.as_ref().to_path_buf();
		let file = OpenOptions::new().write(true).open(&path).unwrap();
		let writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
		Self {
			inner: CsvAppender { path, writer },
			appended: 0,
		}
	}
}

/// Read every well-formed record of a log.
///
/// Returns `Ok(None)` when the file is absent or empty. Rows that do not
/// parse (for example a line cut short by a crash) are skipped.
pub fn read_log(path: impl AsRef<Path>) -> Result<Option<Vec<MeasurementRecord>>> {
	let path = path.as_ref();
	let file = match File::open(path) {
		Ok(file) => file,
		Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
		Err(e) => {
			return Err(Error::LogRead {
				path: path.to_path_buf(),
				source: e.into(),
			})
		}
	};

	let mut reader = csv::ReaderBuilder::new()
		.has_headers(true)
		.flexible(true)
		.from_reader(file);

	let mut records = Vec::new();
	for (line, row) in reader.byte_records().enumerate() {
		let row = row.map_err(|source| Error::LogRead {
			path: path.to_path_buf(),
			source,
		})?;
		// A torn multibyte write leaves a row that is not valid UTF-8
		let parsed = csv::StringRecord::from_byte_record(row)
			.ok()
			.and_then(|row| MeasurementRecord::from_row(&row));
		match parsed {
			Some(record) => records.push(record),
			None => warn!(path = %path.display(), line = line + 2, "skipping malformed log row"),
		}
	}

	if records.is_empty() {
		return Ok(None);
	}
	Ok(Some(records))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn record(server: &str, ping: Option<f64>, domain: &str) -> MeasurementRecord {
		MeasurementRecord::now(
			server,
			ping.map(Duration::from_secs_f64),
			Some(Duration::from_millis(12)),
			None,
			domain,
		)
	}

	fn lines(path: &Path) -> Vec<String> {
		std::fs::read_to_string(path).unwrap().lines().map(String::from).collect()
	}

	#[test]
	fn test_open_creates_file_with_header() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("results.csv");

		let log = LogWriter::open(&path).unwrap();
		assert_eq!(log.appended(), 0);
		assert_eq!(
			lines(&path),
			vec!["timestamp,server,ping_latency,google_query_latency,domain_query_latency,domain"]
		);
	}

	#[test]
	fn test_open_writes_header_into_empty_file() {
		let file = tempfile::NamedTempFile::new().unwrap();
		LogWriter::open(file.path()).unwrap();
		assert_eq!(lines(file.path()).len(), 1);
	}

	#[test]
	fn test_reopen_never_duplicates_header() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("results.csv");

		let mut log = LogWriter::open(&path).unwrap();
		log.append(&record("1.1.1.1", Some(0.01), "example.com")).unwrap();
		drop(log);
		let size_before = std::fs::metadata(&path).unwrap().len();

		let mut log = LogWriter::open(&path).unwrap();
		assert_eq!(std::fs::metadata(&path).unwrap().len(), size_before);
		log.append(&record("8.8.8.8", None, "example.com")).unwrap();

		let content = lines(&path);
		assert_eq!(content.len(), 3);
		assert_eq!(content.iter().filter(|l| l.starts_with("timestamp,")).count(), 1);
		assert!(content[1].contains(",1.1.1.1,0.01,0.012,nan,example.com"));
		assert!(content[2].contains(",8.8.8.8,nan,0.012,nan,example.com"));
	}

	#[test]
	fn test_reopen_after_partial_row() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("results.csv");
		std::fs::write(
			&path,
			"timestamp,server,ping_latency,google_query_latency,domain_query_latency,domain\n\
			 2024-05-01 10:00:00,1.1.1.1,0.01,0.02,0.03,example.com\n\
			 2024-05-01 10:00:01,8.8.8.8,0.0",
		)
		.unwrap();

		let mut log = LogWriter::open(&path).unwrap();
		log.append(&record("9.9.9.9", Some(0.5), "example.org")).unwrap();

		let content = lines(&path);
		assert_eq!(content[1], "2024-05-01 10:00:00,1.1.1.1,0.01,0.02,0.03,example.com");
		assert_eq!(content[2], "2024-05-01 10:00:01,8.8.8.8,0.0");
		assert!(content[3].contains(",9.9.9.9,0.5,"));

		// The cut-off row is skipped, the rest survives
		let records = read_log(&path).unwrap().unwrap();
		let servers: Vec<&str> = records.iter().map(|r| r.server.as_str()).collect();
		assert_eq!(servers, vec!["1.1.1.1", "9.9.9.9"]);
	}

	#[test]
	fn test_read_log_skips_invalid_utf8_row() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("results.csv");
		let mut content = b"timestamp,server,ping_latency,google_query_latency,domain_query_latency,domain\n\
			2024-05-01 10:00:00,1.1.1.1,0.01,0.02,0.03,example.com\n\
			2024-05-01 10:00:01,8.8.8.8,0.01,0.02,0.03,b".to_vec();
		content.extend_from_slice(b"\xc3\n2024-05-01 10:00:02,9.9.9.9,0.01,0.02,0.03,example.org\n");
		std::fs::write(&path, content).unwrap();

		let records = read_log(&path).unwrap().unwrap();
		let servers: Vec<&str> = records.iter().map(|r| r.server.as_str()).collect();
		assert_eq!(servers, vec!["1.1.1.1", "9.9.9.9"]);

		let summary = crate::analysis::basic_analysis(&path).unwrap().unwrap();
		assert_eq!(summary.records, 2);
	}

	#[test]
	fn test_record_round_trip_keeps_absence() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("results.csv");
		let written = MeasurementRecord::now(
			"1.1.1.1",
			None,
			Some(Duration::ZERO),
			Some(Duration::from_micros(1500)),
			"example.com",
		);

		let mut log = LogWriter::open(&path).unwrap();
		log.append(&written).unwrap();

		let read = read_log(&path).unwrap().unwrap();
		assert_eq!(read, vec![written]);
		// Zero latency and absence stay distinct
		assert_eq!(read[0].ping_latency, None);
		assert_eq!(read[0].reference_query_latency, Some(Duration::ZERO));
	}

	#[test]
	fn test_server_with_comma_is_quoted() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("results.csv");
		let mut log = LogWriter::open(&path).unwrap();
		log.append(&record("odd,label", None, "example.com")).unwrap();

		let read = read_log(&path).unwrap().unwrap();
		assert_eq!(read[0].server, "odd,label");
	}

	#[test]
	fn test_read_log_absent_or_header_only() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("results.csv");
		assert!(read_log(&path).unwrap().is_none());

		LogWriter::open(&path).unwrap();
		assert!(read_log(&path).unwrap().is_none());
	}

	#[test]
	fn test_parse_latency() {
		assert_eq!(parse_latency("nan"), Some(None));
		assert_eq!(parse_latency("NaN"), Some(None));
		assert_eq!(parse_latency("None"), Some(None));
		assert_eq!(parse_latency(""), Some(None));
		assert_eq!(parse_latency("0.25"), Some(Some(Duration::from_millis(250))));
		assert_eq!(parse_latency("0"), Some(Some(Duration::ZERO)));
		assert_eq!(parse_latency("-1.0"), None);
		assert_eq!(parse_latency("fast"), None);
	}

	#[test]
	fn test_format_latency() {
		assert_eq!(format_latency(None), "nan");
		assert_eq!(format_latency(Some(Duration::from_millis(250))), "0.25");
		assert_eq!(format_latency(Some(Duration::ZERO)), "0");
	}
}
