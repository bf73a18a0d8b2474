//! ICMP echo requests for raw round-trip latency to a server.

use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use surge_ping::{Client, Config, IcmpPacket, PingIdentifier, PingSequence, ICMP};
use tracing::debug;

/// Payload size of a default `ping` invocation
const PAYLOAD: [u8; 56] = [0; 56];

#[derive(Debug, thiserror::Error)]
pub enum PingError {
	/// Could not create the ICMP socket, usually missing permissions.
	#[error("error creating ping client: {0}")]
	Client(std::io::Error),
	/// The echo request failed or timed out.
	#[error("error sending ping: {0}")]
	Ping(#[from] surge_ping::SurgeError),
	#[error("ping client lock poisoned")]
	Poisoned,
}

/// Sends ICMP echo requests over IPv4 or IPv6.
///
/// Sockets are bound lazily on the first ping of each address family.
#[derive(Default)]
pub struct Pinger {
	timeout: Duration,
	client_v4: Mutex<Option<Client>>,
	client_v6: Mutex<Option<Client>>,
}

impl std::fmt::Debug for Pinger {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Pinger").field("timeout", &self.timeout).finish()
	}
}

impl Pinger {
	pub fn new(timeout: Duration) -> Self {
		Self {
			timeout,
			..Default::default()
		}
	}

	fn get_client(&self, kind: ICMP) -> Result<Client, PingError> {
		let slot = match kind {
			ICMP::V4 => &self.client_v4,
			ICMP::V6 => &self.client_v6,
		};
		let mut slot = slot.lock().map_err(|_| PingError::Poisoned)?;
		if let Some(client) = slot.as_ref() {
			return Ok(client.clone());
		}
		let cfg = Config::builder().kind(kind).build();
		let client = Client::new(&cfg).map_err(PingError::Client)?;
		*slot = Some(client.clone());
		Ok(client)
	}

	/// Send one echo request and return the measured round trip.
	pub async fn send(&self, addr: IpAddr) -> Result<Duration, PingError> {
		let client = match addr {
			IpAddr::V4(_) => self.get_client(ICMP::V4)?,
			IpAddr::V6(_) => self.get_client(ICMP::V6)?,
		};
		let ident = PingIdentifier(rand::random());
		let mut pinger = client.pinger(addr, ident).await;
		pinger.timeout(self.timeout);
		let (packet, rtt) = pinger.ping(PingSequence(0), &PAYLOAD).await?;
		match packet {
			IcmpPacket::V4(packet) => debug!(
				"{} bytes from {}: icmp_seq={} ttl={:?} time={:0.2?}",
				packet.get_size(),
				packet.get_source(),
				packet.get_sequence(),
				packet.get_ttl(),
				rtt
			),
			IcmpPacket::V6(packet) => debug!(
				"{} bytes from {}: icmp_seq={} hlim={} time={:0.2?}",
				packet.get_size(),
				packet.get_source(),
				packet.get_sequence(),
				packet.get_max_hop_limit(),
				rtt
			),
		}
		Ok(rtt)
	}
}
