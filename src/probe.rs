//! The latency probe boundary.
//!
//! Every failure below this point is collapsed into `None`; callers only
//! ever see a latency or its absence.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::dns;
use crate::ping::Pinger;
use crate::transport::{DnsServer, ProbeKind};

/// One reachability/latency measurement against one server.
#[async_trait]
pub trait Probe: Send + Sync {
	/// Returns the round-trip time, or `None` if the target was unmeasurable.
	async fn measure(&self, server: &DnsServer, kind: ProbeKind<'_>) -> Option<Duration>;
}

/// Probe backed by real ICMP and UDP DNS traffic.
#[derive(Debug)]
pub struct NetworkProbe {
	pinger: Pinger,
	query_timeout: Duration,
}

impl NetworkProbe {
	pub fn new(query_timeout: Duration, ping_timeout: Duration) -> Self {
		Self {
			pinger: Pinger::new(ping_timeout),
			query_timeout,
		}
	}
}

#[async_trait]
impl Probe for NetworkProbe {
	async fn measure(&self, server: &DnsServer, kind: ProbeKind<'_>) -> Option<Duration> {
		match kind {
			ProbeKind::Ping => match self.pinger.send(server.addr.ip()).await {
				Ok(rtt) => Some(rtt),
				Err(e) => {
					debug!(server = %server.label, error = %e, "ping unmeasurable");
					None
				}
			},
			ProbeKind::Dns { domain } => {
				match dns::timed_query(server.addr, domain, self.query_timeout).await {
					Ok(latency) => Some(latency),
					Err(e) => {
						debug!(server = %server.label, domain, error = %e, "query unmeasurable");
						None
					}
				}
			}
		}
	}
}
