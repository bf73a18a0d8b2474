use std::net::SocketAddr;

/// A DNS server under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsServer {
	/// Address string as listed in the server file, used as the log identifier
	pub label: String,
	pub addr: SocketAddr,
}

/// DNS query type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
	A,
	DNSKEY,
}

/// What a single latency probe measures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind<'a> {
	/// One ICMP echo round trip to the server
	Ping,
	/// One resolution of `domain` using only this server
	Dns { domain: &'a str },
}
