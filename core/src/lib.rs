//! # Sweepr Core
//!
//! Reachability probing and the scan engine that drives it.
//!
//! * [`probe`]: the [`Prober`](probe::Prober) abstraction with its ICMP echo
//!   and TCP connect implementations.
//! * [`engine`]: a bounded worker pool that walks a
//!   [`NetworkRange`](sweepr_common::network::range::NetworkRange), probes
//!   every host and aggregates the live ones.

pub mod engine;
pub mod probe;

pub use engine::{ScanEngine, StopSignal, scan};
