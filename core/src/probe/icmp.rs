//! ICMP echo probing over raw (or unprivileged datagram) ICMP sockets.
//!
//! Sockets are opened once per scan and shared by all workers. Replies are
//! matched to requests by a random identifier chosen per probe.
//!
//! The kernel refuses sends to some single hosts (`EACCES` for a broadcast
//! address, `EPERM` from an outbound firewall rule). Such a refusal makes that
//! host unreachable. Only a run of refusals before any echo request has gone
//! out is taken as the socket itself being unusable.

use std::io;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence, SurgeError};
use sweepr_common::error::ProbeSetupError;
use sweepr_common::network::range::NetworkRange;
use sweepr_common::scan::ProbeOutcome;
use tracing::{debug, trace};

use super::Prober;

const ECHO_PAYLOAD: [u8; 56] = [0; 56];

/// Refused sends tolerated before the first successful one.
const REFUSALS_BEFORE_ABORT: usize = 8;

pub struct IcmpProbe {
    v4: Option<Client>,
    v6: Option<Client>,
    refusals: RefusalTracker,
}

/// Tells per-host send refusals apart from a socket that cannot send at all.
#[derive(Debug, Default)]
struct RefusalTracker {
    delivered: AtomicBool,
    refused: AtomicUsize,
}

impl RefusalTracker {
    fn delivered(&self) {
        self.delivered.store(true, Ordering::Relaxed);
    }

    /// Counts one refusal. Returns `true` once refusals can no longer be
    /// blamed on individual hosts.
    fn refused(&self) -> bool {
        let refused: usize = self.refused.fetch_add(1, Ordering::Relaxed) + 1;
        !self.delivered.load(Ordering::Relaxed) && refused >= REFUSALS_BEFORE_ABORT
    }
}

impl IcmpProbe {
    /// Opens the socket needed for the address family of `range`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn for_range(range: &NetworkRange) -> Result<Self, ProbeSetupError> {
        if range.is_ipv6() {
            Self::v6()
        } else {
            Self::v4()
        }
    }

    pub fn v4() -> Result<Self, ProbeSetupError> {
        Ok(Self {
            v4: Some(open_client(ICMP::V4)?),
            v6: None,
            refusals: RefusalTracker::default(),
        })
    }

    pub fn v6() -> Result<Self, ProbeSetupError> {
        Ok(Self {
            v4: None,
            v6: Some(open_client(ICMP::V6)?),
            refusals: RefusalTracker::default(),
        })
    }

    fn client_for(&self, host: IpAddr) -> Option<&Client> {
        match host {
            IpAddr::V4(_) => self.v4.as_ref(),
            IpAddr::V6(_) => self.v6.as_ref(),
        }
    }
}

fn open_client(kind: ICMP) -> Result<Client, ProbeSetupError> {
    let (config, label) = match kind {
        ICMP::V4 => (Config::default(), "ICMPv4"),
        ICMP::V6 => (Config::builder().kind(ICMP::V6).build(), "ICMPv6"),
    };

    Client::new(&config).map_err(|source| ProbeSetupError::SocketUnavailable { kind: label, source })
}

#[async_trait]
impl Prober for IcmpProbe {
    async fn probe(&self, host: IpAddr, timeout: Duration) -> Result<ProbeOutcome, ProbeSetupError> {
        let Some(client) = self.client_for(host) else {
            debug!("no ICMP socket open for the address family of {host}");
            return Ok(ProbeOutcome::Unreachable);
        };

        let mut pinger = client.pinger(host, PingIdentifier(rand::random())).await;
        pinger.timeout(timeout);

        let reply = pinger.ping(PingSequence(0), &ECHO_PAYLOAD).await.map(|(_packet, rtt)| rtt);
        classify(host, reply, &self.refusals)
    }
}

/// Maps the answer to one echo request onto a probe outcome.
fn classify(
    host: IpAddr,
    reply: Result<Duration, SurgeError>,
    refusals: &RefusalTracker,
) -> Result<ProbeOutcome, ProbeSetupError> {
    match reply {
        Ok(rtt) => {
            refusals.delivered();
            debug!("echo reply from {host} in {rtt:?}");
            Ok(ProbeOutcome::Reachable)
        }
        Err(SurgeError::IOError(source)) if source.kind() == io::ErrorKind::PermissionDenied => {
            if refusals.refused() {
                return Err(ProbeSetupError::PermissionDenied { host, source });
            }
            debug!("sending to {host} was refused: {source}");
            Ok(ProbeOutcome::Unreachable)
        }
        Err(e) => {
            refusals.delivered();
            trace!("no echo reply from {host}: {e}");
            Ok(ProbeOutcome::Unreachable)
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
