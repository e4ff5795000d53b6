//! # Sweepr Common
//!
//! Shared data model for the scanner: network ranges and their host
//! enumeration, scan modes, probe outcomes, configuration and the error
//! taxonomy.

pub mod config;
pub mod error;
pub mod network;
pub mod scan;

#[doc(hidden)]
pub use tracing as __tracing;

/// Logs a positive result (a live host, a finished scan).
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        $crate::__tracing::info!(target: "sweepr::success", $($arg)*)
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::__tracing::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::__tracing::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::__tracing::error!($($arg)*)
    };
}
