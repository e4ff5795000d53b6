//! # Scan Mode
//!
//! Selects how reachability is tested: ICMP echo, or a TCP handshake against
//! one fixed port.

use std::fmt;

use crate::error::ConfigurationError;

/// A TCP port in `1..=65535`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Port(u16);

impl Port {
    pub fn new(raw: u32) -> Result<Self, ConfigurationError> {
        match u16::try_from(raw) {
            Ok(port) if port != 0 => Ok(Self(port)),
            _ => Err(ConfigurationError::InvalidPort(raw)),
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for Port {
    type Error = ConfigurationError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        Self::new(u32::from(raw))
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Probe kind without its parameters, as chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Icmp,
    Tcp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// ICMP echo request/reply.
    Icmp,
    /// Full TCP handshake against `port`.
    Tcp { port: Port },
}

impl ScanMode {
    /// Combines a mode kind with the optional raw port from user input.
    ///
    /// The port is mandatory and range-checked for TCP. ICMP ignores it.
    pub fn from_parts(kind: ModeKind, port: Option<u32>) -> Result<Self, ConfigurationError> {
        match kind {
            ModeKind::Icmp => Ok(Self::Icmp),
            ModeKind::Tcp => {
                let raw = port.ok_or(ConfigurationError::MissingPort)?;
                Ok(Self::Tcp { port: Port::new(raw)? })
            }
        }
    }

    pub fn port(&self) -> Option<Port> {
        match self {
            Self::Icmp => None,
            Self::Tcp { port } => Some(*port),
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Icmp => write!(f, "ICMP echo"),
            Self::Tcp { port } => write!(f, "TCP connect (port {port})"),
        }
    }
}
