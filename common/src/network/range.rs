//! # Network Range Model
//!
//! A CIDR block (`192.168.1.0/24`, `fd00::/120`) and the lazy enumeration of
//! its assignable host addresses.
//!
//! Host bits in the input are masked off rather than rejected, so
//! `192.168.1.77/24` describes the same range as `192.168.1.0/24`.
//!
//! ## Reserved addresses
//!
//! | family | prefix     | yielded hosts                               |
//! |--------|------------|---------------------------------------------|
//! | IPv4   | `0..=30`   | everything except network and broadcast     |
//! | IPv4   | `31`       | both addresses (point-to-point link)        |
//! | IPv4   | `32`       | the single address                          |
//! | IPv6   | `0..=126`  | everything except the subnet-router anycast |
//! | IPv6   | `127`      | both addresses                              |
//! | IPv6   | `128`      | the single address                          |

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use pnet::ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};

use crate::error::InvalidRangeError;

const IPV4_MAX_PREFIX: u8 = 32;
const IPV6_MAX_PREFIX: u8 = 128;

/// A normalized CIDR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkRange {
    network: IpNetwork,
}

impl NetworkRange {
    /// Builds a range from any address inside it and a prefix length.
    pub fn new(addr: IpAddr, prefix: u8) -> Result<Self, InvalidRangeError> {
        let network = match addr {
            IpAddr::V4(v4) => {
                check_prefix(prefix, IPV4_MAX_PREFIX)?;
                let net = Ipv4Network::new(v4, prefix)
                    .map_err(|_| InvalidRangeError::PrefixTooLong { prefix, max: IPV4_MAX_PREFIX })?;
                let base = Ipv4Network::new(net.network(), prefix)
                    .map_err(|_| InvalidRangeError::PrefixTooLong { prefix, max: IPV4_MAX_PREFIX })?;
                IpNetwork::V4(base)
            }
            IpAddr::V6(v6) => {
                check_prefix(prefix, IPV6_MAX_PREFIX)?;
                let net = Ipv6Network::new(v6, prefix)
                    .map_err(|_| InvalidRangeError::PrefixTooLong { prefix, max: IPV6_MAX_PREFIX })?;
                let base = Ipv6Network::new(net.network(), prefix)
                    .map_err(|_| InvalidRangeError::PrefixTooLong { prefix, max: IPV6_MAX_PREFIX })?;
                IpNetwork::V6(base)
            }
        };

        Ok(Self { network })
    }

    pub fn prefix(&self) -> u8 {
        self.network.prefix()
    }

    pub fn is_ipv6(&self) -> bool {
        self.network.is_ipv6()
    }

    /// Every usable host in ascending order.
    ///
    /// The iterator is lazy and cheap to clone, so the same range can be
    /// walked any number of times.
    pub fn hosts(&self) -> Hosts {
        match self.network {
            IpNetwork::V4(net) => {
                let first = u32::from(net.network()) as u128;
                let last = u32::from(net.broadcast()) as u128;
                let (start, end) = usable_bounds(first, last, net.prefix(), IPV4_MAX_PREFIX, true);
                Hosts::new(Family::V4, start, end)
            }
            IpNetwork::V6(net) => {
                let first = u128::from(net.network());
                let last = first | !u128::from(net.mask());
                let (start, end) = usable_bounds(first, last, net.prefix(), IPV6_MAX_PREFIX, false);
                Hosts::new(Family::V6, start, end)
            }
        }
    }

    /// Number of addresses [`NetworkRange::hosts`] yields, without iterating.
    pub fn host_count(&self) -> u128 {
        self.hosts().remaining()
    }
}

impl fmt::Display for NetworkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network.network(), self.network.prefix())
    }
}

impl FromStr for NetworkRange {
    type Err = InvalidRangeError;

    /// Parses `addr/prefix`, or a bare address as a single-host block.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr_str, prefix_str) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };

        let addr = addr_str
            .parse::<IpAddr>()
            .map_err(|_| InvalidRangeError::InvalidAddress(addr_str.to_string()))?;

        let prefix = match prefix_str {
            Some(p) => p
                .parse::<u8>()
                .map_err(|_| InvalidRangeError::InvalidPrefix(p.to_string()))?,
            None if addr.is_ipv4() => IPV4_MAX_PREFIX,
            None => IPV6_MAX_PREFIX,
        };

        Self::new(addr, prefix)
    }
}

fn check_prefix(prefix: u8, max: u8) -> Result<(), InvalidRangeError> {
    if prefix > max {
        return Err(InvalidRangeError::PrefixTooLong { prefix, max });
    }
    Ok(())
}

/// Strips the reserved addresses off `[first, last]`.
///
/// IPv4 blocks lose both ends, IPv6 blocks only the subnet-router anycast.
/// The two smallest prefixes of either family keep everything.
fn usable_bounds(first: u128, last: u128, prefix: u8, max: u8, strip_last: bool) -> (u128, u128) {
    if prefix + 1 >= max {
        return (first, last);
    }
    let end = if strip_last { last - 1 } else { last };
    (first + 1, end)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    V4,
    V6,
}

/// Ascending iterator over the hosts of a [`NetworkRange`].
#[derive(Debug, Clone)]
pub struct Hosts {
    family: Family,
    next: u128,
    end: u128,
    exhausted: bool,
}

impl Hosts {
    fn new(family: Family, next: u128, end: u128) -> Self {
        Self {
            family,
            next,
            end,
            exhausted: next > end,
        }
    }

    /// Addresses left to yield.
    pub fn remaining(&self) -> u128 {
        if self.exhausted {
            return 0;
        }
        // A full IPv6 /0 holds 2^128 - 1 hosts, one short of overflowing.
        self.end - self.next + 1
    }

    fn to_addr(&self, raw: u128) -> IpAddr {
        match self.family {
            Family::V4 => IpAddr::V4(Ipv4Addr::from(raw as u32)),
            Family::V6 => IpAddr::V6(Ipv6Addr::from(raw)),
        }
    }
}

impl Iterator for Hosts {
    type Item = IpAddr;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let current = self.next;
        if current == self.end {
            self.exhausted = true;
        } else {
            self.next += 1;
        }

        Some(self.to_addr(current))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining()) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
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
