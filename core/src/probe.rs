//! The central **abstraction** for reachability probes.
//!
//! The engine depends only on [`Prober`]; the concrete strategy is chosen once
//! from the [`ScanMode`] through [`for_mode`].

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sweepr_common::error::ProbeSetupError;
use sweepr_common::network::mode::ScanMode;
use sweepr_common::network::range::NetworkRange;
use sweepr_common::scan::ProbeOutcome;

pub mod icmp;
pub mod tcp;

pub use icmp::IcmpProbe;
pub use tcp::TcpConnectProbe;

/// Tests whether a single host answers.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probes `host`, giving up after `timeout`.
    ///
    /// A host that does not answer is [`ProbeOutcome::Unreachable`], never an
    /// error. `Err` is reserved for failures that make every further probe
    /// pointless, such as missing privileges.
    async fn probe(&self, host: IpAddr, timeout: Duration) -> Result<ProbeOutcome, ProbeSetupError>;

    /// How `host` is named in per-host log lines.
    fn label(&self, host: IpAddr) -> String {
        format!("Host {host}")
    }
}

/// Builds the prober selected by `mode`.
///
/// Sockets needed by the probe are opened here, so environmental failures
/// surface before the first host is touched.
pub fn for_mode(mode: ScanMode, range: &NetworkRange) -> Result<Arc<dyn Prober>, ProbeSetupError> {
    match mode {
        ScanMode::Icmp => Ok(Arc::new(IcmpProbe::for_range(range)?)),
        ScanMode::Tcp { port } => Ok(Arc::new(TcpConnectProbe::with_port(port))),
    }
}
