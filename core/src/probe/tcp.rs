use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use sweepr_common::error::{ConfigurationError, ProbeSetupError};
use sweepr_common::network::mode::Port;
use sweepr_common::scan::ProbeOutcome;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

use super::Prober;

/// Reachability through a full TCP handshake on one port.
///
/// Refused connections count as unreachable: only a listening port makes a
/// host live in this mode.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnectProbe {
    port: Port,
}

impl TcpConnectProbe {
    pub fn new(port: u16) -> Result<Self, ConfigurationError> {
        Ok(Self::with_port(Port::try_from(port)?))
    }

    pub fn with_port(port: Port) -> Self {
        Self { port }
    }
}

#[async_trait]
impl Prober for TcpConnectProbe {
    async fn probe(&self, host: IpAddr, probe_timeout: Duration) -> Result<ProbeOutcome, ProbeSetupError> {
        let socket_addr: SocketAddr = SocketAddr::new(host, self.port.get());

        // The stream, if any, is dropped (and closed) at the end of each arm.
        match timeout(probe_timeout, TcpStream::connect(socket_addr)).await {
            Ok(Ok(_stream)) => Ok(ProbeOutcome::Reachable),
            Ok(Err(e)) => {
                trace!("connect to {socket_addr} failed: {e}");
                Ok(ProbeOutcome::Unreachable)
            }
            Err(_elapsed) => Ok(ProbeOutcome::Unreachable),
        }
    }

    fn label(&self, host: IpAddr) -> String {
        format!("Host {host} on port {}", self.port)
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
