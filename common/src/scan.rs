//! # Scan Results
//!
//! Per-host outcomes and the aggregate set of reachable hosts.

use std::collections::HashSet;
use std::fmt;
use std::net::IpAddr;

use crate::error::ProbeSetupError;

/// Result of probing one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeOutcome {
    Reachable,
    Unreachable,
}

impl ProbeOutcome {
    pub fn is_reachable(self) -> bool {
        matches!(self, Self::Reachable)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reachable => write!(f, "online"),
            Self::Unreachable => write!(f, "offline"),
        }
    }
}

/// Observation emitted after every probe, independent of the final result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub host: IpAddr,
    pub outcome: ProbeOutcome,
    /// Probes resolved so far, this one included.
    pub completed: usize,
    /// Hosts in the range, saturated to `usize::MAX`.
    pub total: usize,
}

/// Why a scan stopped.
#[derive(Debug, Default)]
pub enum ScanStatus {
    #[default]
    Completed,
    /// Stopped from the outside; remaining hosts were never probed.
    Cancelled,
    /// Probing became impossible part way through.
    Aborted(ProbeSetupError),
}

/// Reachable hosts of a finished scan.
///
/// Hosts are kept in the order their probes resolved. Built through a
/// [`ResultSink`] and read-only afterwards.
#[derive(Debug, Default)]
pub struct ScanResult {
    live: Vec<IpAddr>,
    probed: usize,
    status: ScanStatus,
}

impl ScanResult {
    /// Reachable hosts in resolution order.
    pub fn live_hosts(&self) -> &[IpAddr] {
        &self.live
    }

    /// Reachable hosts in ascending address order.
    pub fn sorted_hosts(&self) -> Vec<IpAddr> {
        let mut hosts = self.live.clone();
        hosts.sort();
        hosts
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of hosts whose probe resolved, reachable or not.
    pub fn probed(&self) -> usize {
        self.probed
    }

    pub fn status(&self) -> &ScanStatus {
        &self.status
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, ScanStatus::Completed)
    }

    /// The setup error of an aborted scan, if any.
    pub fn into_failure(self) -> Option<ProbeSetupError> {
        match self.status {
            ScanStatus::Aborted(err) => Some(err),
            _ => None,
        }
    }
}

/// Exclusive writer of a [`ScanResult`].
#[derive(Debug, Default)]
pub struct ResultSink {
    live: Vec<IpAddr>,
    seen: HashSet<IpAddr>,
    probed: usize,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one outcome. Returns `true` if `host` is a new live host.
    pub fn record(&mut self, host: IpAddr, outcome: ProbeOutcome) -> bool {
        self.probed += 1;
        if !outcome.is_reachable() || !self.seen.insert(host) {
            return false;
        }
        self.live.push(host);
        true
    }

    pub fn probed(&self) -> usize {
        self.probed
    }

    pub fn finish(self, status: ScanStatus) -> ScanResult {
        ScanResult {
            live: self.live,
            probed: self.probed,
            status,
        }
    }
}
