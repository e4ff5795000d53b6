//! Error taxonomy of a scan.
//!
//! * [`InvalidRangeError`] and [`ConfigurationError`] are raised before the
//!   first probe is sent.
//! * [`ProbeSetupError`] means probing is impossible in this environment and
//!   ends the scan.
//!
//! An unreachable host is not an error; see
//! [`ProbeOutcome`](crate::scan::ProbeOutcome).

use std::io;
use std::net::IpAddr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidRangeError {
    #[error("invalid network address '{0}'")]
    InvalidAddress(String),

    #[error("invalid prefix length '{0}'")]
    InvalidPrefix(String),

    #[error("prefix /{prefix} exceeds the maximum of /{max}")]
    PrefixTooLong { prefix: u8, max: u8 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Port is required for TCP mode.")]
    MissingPort,

    #[error("invalid port {0}: must be between 1 and 65535")]
    InvalidPort(u32),

    #[error("timeout must be greater than zero")]
    InvalidTimeout,

    #[error("concurrency must be at least 1")]
    InvalidConcurrency,
}

#[derive(Error, Debug)]
pub enum ProbeSetupError {
    #[error("unable to open {kind} socket: {source}")]
    SocketUnavailable {
        kind: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("not permitted to probe {host}: {source}")]
    PermissionDenied {
        host: IpAddr,
        #[source]
        source: io::Error,
    },
}

impl ProbeSetupError {
    pub fn is_permission_error(&self) -> bool {
        match self {
            Self::SocketUnavailable { source, .. } => source.kind() == io::ErrorKind::PermissionDenied,
            Self::PermissionDenied { .. } => true,
        }
    }
}
