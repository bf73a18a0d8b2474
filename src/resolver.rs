use std::net::SocketAddr;
use std::path::Path;

use crate::domains::load_lines;
use crate::error::{Error, Result};
use crate::transport::DnsServer;

/// Parse a server address string into a DnsServer.
///
/// Supports formats:
///   "1.1.1.1"              -- IPv4, default port 53
///   "1.1.1.1:53"           -- IPv4 with explicit port
///   "2606:4700::1111"      -- bare IPv6, default port 53
///   "[2606:4700::1111]:53" -- bracketed IPv6 with port
///
/// The trimmed input is kept verbatim as the label so log rows carry the
/// address exactly as it appears in the server list.
pub fn parse_server(input: &str) -> Result<DnsServer> {
	let trimmed = input.trim();
	let invalid = |reason: String| Error::InvalidServer {
		input: trimmed.to_string(),
		reason,
	};
	if trimmed.is_empty() {
		return Err(invalid("empty address".to_string()));
	}

	let addr: SocketAddr = if trimmed.starts_with('[') {
		// Bracketed IPv6 with port: [::1]:53
		trimmed.parse().map_err(|e| invalid(format!("{}", e)))?
	} else if trimmed.contains("::") || trimmed.matches(':').count() > 1 {
		// Bare IPv6 address without port
		let ip = trimmed.parse().map_err(|e| invalid(format!("{}", e)))?;
		SocketAddr::new(ip, 53)
	} else if let Ok(addr) = trimmed.parse::<SocketAddr>() {
		// IPv4 with port (e.g. "8.8.8.8:5353")
		addr
	} else {
		// Plain IPv4 without port
		let ip = trimmed.parse().map_err(|e| invalid(format!("{}", e)))?;
		SocketAddr::new(ip, 53)
	};

	Ok(DnsServer {
		label: trimmed.to_string(),
		addr,
	})
}

/// Read server addresses from a file, one per line.
///
/// Blank lines and lines starting with '#' are skipped. A missing file or
/// an unparsable address is an error.
pub fn read_server_file(path: impl AsRef<Path>) -> Result<Vec<DnsServer>> {
	load_lines("server", path)?
		.iter()
		.map(|line| parse_server(line))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn test_ipv4_no_port() {
		let s = parse_server("1.1.1.1").unwrap();
		assert_eq!(s.addr.port(), 53);
		assert_eq!(s.addr.ip().to_string(), "1.1.1.1");
		assert_eq!(s.label, "1.1.1.1");
	}

	#[test]
	fn test_ipv4_with_port() {
		let s = parse_server("8.8.8.8:5353").unwrap();
		assert_eq!(s.addr.port(), 5353);
		assert_eq!(s.addr.ip().to_string(), "8.8.8.8");
		assert_eq!(s.label, "8.8.8.8:5353");
	}

	#[test]
	fn test_ipv6_bare() {
		let s = parse_server("2606:4700::1111").unwrap();
		assert_eq!(s.addr.port(), 53);
	}

	#[test]
	fn test_ipv6_bracketed() {
		let s = parse_server("[2606:4700::1111]:53").unwrap();
		assert_eq!(s.addr.port(), 53);
	}

	#[test]
	fn test_label_is_trimmed_input() {
		let s = parse_server("  9.9.9.9 \t").unwrap();
		assert_eq!(s.label, "9.9.9.9");
	}

	#[test]
	fn test_invalid_input() {
		let err = parse_server("not-an-ip").unwrap_err();
		assert!(matches!(err, Error::InvalidServer { .. }));
	}

	#[test]
	fn test_read_server_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "# public resolvers").unwrap();
		writeln!(file, "1.1.1.1").unwrap();
		writeln!(file).unwrap();
		writeln!(file, "8.8.8.8").unwrap();

		let servers = read_server_file(file.path()).unwrap();
		let labels: Vec<&str> = servers.iter().map(|s| s.label.as_str()).collect();
		assert_eq!(labels, vec!["1.1.1.1", "8.8.8.8"]);
	}

	#[test]
	fn test_read_server_file_rejects_bad_line() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "1.1.1.1").unwrap();
		writeln!(file, "dns.example").unwrap();
		assert!(read_server_file(file.path()).is_err());
	}
}
