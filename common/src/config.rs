use std::time::Duration;

use crate::error::ConfigurationError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_CONCURRENCY: usize = 32;

/// Knobs of a single scan, shared by both probing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Upper bound for one probe. Applies to ICMP and TCP alike.
    pub timeout: Duration,
    /// Number of probes allowed in flight at once.
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl Config {
    pub fn validate(self) -> Result<Self, ConfigurationError> {
        if self.timeout.is_zero() {
            return Err(ConfigurationError::InvalidTimeout);
        }
        if self.concurrency == 0 {
            return Err(ConfigurationError::InvalidConcurrency);
        }
        Ok(self)
    }
}
