use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use hickory_proto::op::{Edns, Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::{Name, RecordType};
use tokio::net::UdpSocket;

use crate::transport::QueryType;

/// Why a single DNS exchange did not yield a usable answer
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
	#[error("invalid domain name '{domain}': {reason}")]
	InvalidName { domain: String, reason: String },
	#[error("failed to serialize DNS query: {0}")]
	Encode(String),
	#[error("failed to parse DNS response: {0}")]
	Malformed(String),
	#[error("txid mismatch: expected {expected}, got {got}")]
	TxidMismatch { expected: u16, got: u16 },
	#[error("received a query instead of a response")]
	NotAResponse,
	#[error("socket error: {0}")]
	Socket(#[from] io::Error),
	#[error("no response within {0:?}")]
	Timeout(Duration),
	#[error("server answered {0}")]
	Rcode(ResponseCode),
	#[error("response carries no A records")]
	NoAnswer,
}

/// DNS response information extracted from a parsed message
#[derive(Debug)]
pub struct DnsResponse {
	pub rcode: ResponseCode,
	pub answer_count: usize,
	/// True if the answer section contains A records
	pub has_a_records: bool,
	/// AD flag: the server validated the answer with DNSSEC
	pub authentic_data: bool,
	pub truncated: bool,
}

/// Build a DNS query message for the given domain and query type.
///
/// When dnssec is true, the DO (DNSSEC OK) bit is set via EDNS.
/// Returns the serialized query bytes ready to send over UDP.
pub fn build_query(
	domain: &str,
	query_type: QueryType,
	txid: u16,
	dnssec: bool,
) -> Result<Vec<u8>, QueryError> {
	let name = Name::from_ascii(domain).map_err(|e| QueryError::InvalidName {
		domain: domain.to_string(),
		reason: e.to_string(),
	})?;

	let record_type = match query_type {
		QueryType::A => RecordType::A,
		QueryType::DNSKEY => RecordType::DNSKEY,
	};

	let mut message = Message::new();
	message.set_id(txid);
	message.set_recursion_desired(true);
	message.add_query(Query::query(name, record_type));

	// Set DNSSEC OK bit via EDNS when requested
	if dnssec {
		let edns = message.extensions_mut().get_or_insert_with(Edns::new);
		edns.set_max_payload(4096);
		edns.set_dnssec_ok(true);
	}

	message.to_vec().map_err(|e| QueryError::Encode(e.to_string()))
}

/// Parse a DNS response, validating the transaction ID and extracting the rcode.
///
/// Returns an error if the response cannot be parsed or the txid does not match.
pub fn parse_response(bytes: &[u8], expected_txid: u16) -> Result<DnsResponse, QueryError> {
	let message = Message::from_vec(bytes)
		.map_err(|e| QueryError::Malformed(e.to_string()))?;

	if message.id() != expected_txid {
		return Err(QueryError::TxidMismatch {
			expected: expected_txid,
			got: message.id(),
		});
	}

	if message.message_type() != MessageType::Response {
		return Err(QueryError::NotAResponse);
	}

	let has_a_records = message.answers().iter()
		.any(|r| r.record_type() == RecordType::A);

	Ok(DnsResponse {
		rcode: message.response_code(),
		answer_count: message.answer_count() as usize,
		has_a_records,
		authentic_data: message.authentic_data(),
		truncated: message.truncated(),
	})
}

/// Decide whether a response resolved the name.
///
/// Only NOERROR with at least one A record counts; NXDOMAIN, SERVFAIL and
/// empty answers are failures.
pub fn check_answer(response: &DnsResponse) -> Result<(), QueryError> {
	if response.rcode != ResponseCode::NoError {
		return Err(QueryError::Rcode(response.rcode));
	}
	if !response.has_a_records {
		return Err(QueryError::NoAnswer);
	}
	Ok(())
}

/// Send a single query over UDP and wait for the matching response.
///
/// Uses a dedicated socket per query. Datagrams from other sources or with
/// a foreign txid are dropped until the timeout expires. The returned
/// duration runs from dispatch to arrival of the accepted response.
pub async fn send_query(
	server: SocketAddr,
	query_bytes: &[u8],
	txid: u16,
	timeout: Duration,
) -> Result<(DnsResponse, Duration), QueryError> {
	let bind_addr = if server.is_ipv4() {
		"0.0.0.0:0"
	} else {
		"[::]:0"
	};
	let socket = UdpSocket::bind(bind_addr).await?;

	let start = Instant::now();
	socket.send_to(query_bytes, server).await?;

	// 4096-byte buffer to handle EDNS-extended responses
	let mut buf = vec![0u8; 4096];
	loop {
		let remaining = timeout.saturating_sub(start.elapsed());
		if remaining.is_zero() {
			return Err(QueryError::Timeout(timeout));
		}

		let (len, src) = match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
			Ok(received) => received?,
			Err(_) => return Err(QueryError::Timeout(timeout)),
		};
		let latency = start.elapsed();
		if src != server {
			continue;
		}
		match parse_response(&buf[..len], txid) {
			Ok(response) => return Ok((response, latency)),
			Err(QueryError::TxidMismatch { .. }) => continue,
			Err(e) => return Err(e),
		}
	}
}

/// Resolve `domain` against `server` alone and return the round-trip time.
pub async fn timed_query(
	server: SocketAddr,
	domain: &str,
	timeout: Duration,
) -> Result<Duration, QueryError> {
	let txid: u16 = rand::random();
	let query_bytes = build_query(domain, QueryType::A, txid, false)?;
	let (response, latency) = send_query(server, &query_bytes, txid, timeout).await?;
	check_answer(&response)?;
	Ok(latency)
}
