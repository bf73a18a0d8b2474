use std::path::Path;

use crate::error::{Error, Result};

/// Always-resolvable domain queried on every tick for baseline comparison.
pub const DEFAULT_REFERENCE_DOMAIN: &str = "google.com";

/// Read a newline-delimited list from a file, preserving order.
///
/// Lines are trimmed; blank lines and lines starting with '#' are skipped.
/// `kind` names the list in the error message.
pub fn load_lines(kind: &'static str, path: impl AsRef<Path>) -> Result<Vec<String>> {
	let path = path.as_ref();
	let content = std::fs::read_to_string(path).map_err(|source| Error::InputFile {
		kind,
		path: path.to_path_buf(),
		source,
	})?;
	let lines: Vec<String> = content.lines()
		.map(|line| line.trim().to_string())
		.filter(|line| !line.is_empty() && !line.starts_with('#'))
		.collect();
	Ok(lines)
}

/// Read the domain pool from a file, one domain per line.
pub fn read_domain_file(path: impl AsRef<Path>) -> Result<Vec<String>> {
	load_lines("domain", path)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_load_lines_skips_blank_and_comments() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "example.com\n\n  # comment\n wikipedia.org \r\nexample.com\n").unwrap();

		let lines = load_lines("domain", file.path()).unwrap();
		// Duplicates are kept, order is preserved
		assert_eq!(lines, vec!["example.com", "wikipedia.org", "example.com"]);
	}

	#[test]
	fn test_load_lines_empty_file() {
		let file = tempfile::NamedTempFile::new().unwrap();
		assert!(read_domain_file(file.path()).unwrap().is_empty());
	}

	#[test]
	fn test_missing_file_is_error() {
		let dir = tempfile::tempdir().unwrap();
		let err = read_domain_file(dir.path().join("absent.txt")).unwrap_err();
		assert!(matches!(err, Error::InputFile { kind: "domain", .. }));
		assert!(err.to_string().contains("absent.txt"));
	}
}
