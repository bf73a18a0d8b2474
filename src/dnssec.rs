use std::net::SocketAddr;
use std::time::Duration;

use tracing::debug;

use crate::dns::{build_query, send_query, QueryError};
use crate::transport::{DnsServer, QueryType};

/// Signed zone queried when no domain is given.
pub const DEFAULT_DNSSEC_DOMAIN: &str = "iana.org";

/// Ask `server` for the DNSKEY set of `domain` with the DO bit set.
///
/// Returns true if the answer carries the AD flag, meaning the server
/// validated it.
pub async fn check_dnssec(
	server: SocketAddr,
	domain: &str,
	timeout: Duration,
) -> Result<bool, QueryError> {
	let txid: u16 = rand::random();
	let query_bytes = build_query(domain, QueryType::DNSKEY, txid, true)?;
	let (response, latency) = send_query(server, &query_bytes, txid, timeout).await?;
	debug!(
		%server,
		rcode = %response.rcode,
		answers = response.answer_count,
		truncated = response.truncated,
		?latency,
		"DNSKEY response"
	);
	Ok(response.authentic_data)
}

/// Check every server in order and print one verdict line each.
///
/// Returns the servers that validated.
pub async fn run_dnssec_checks(
	servers: &[DnsServer],
	domain: &str,
	timeout: Duration,
) -> Vec<DnsServer> {
	let mut validating = Vec::new();
	for server in servers {
		let supported = match check_dnssec(server.addr, domain, timeout).await {
			Ok(supported) => supported,
			Err(e) => {
				println!("Error querying DNS server {}: {}", server.label, e);
				false
			}
		};
		if supported {
			println!("DNS server {} supports DNSSEC.", server.label);
			validating.push(server.clone());
		} else {
			println!("DNS server {} does not support DNSSEC.", server.label);
		}
	}
	validating
}
