//! Reader options DTO

use crate::domain::entities::{DEFAULT_TRANSFER_BLOCKS, OPTICAL_TRANSFER_BLOCKS};
use crate::domain::services::DEFAULT_PROBE_ATTEMPTS;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Options controlling how a device is probed and read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Timeout forwarded to every command, in milliseconds
    pub timeout_ms: u64,
    /// Whether to look for raw (long) read support
    pub want_raw: bool,
    /// Block count the transfer tuner starts halving from
    pub initial_transfer_blocks: u32,
    /// Trial addresses the capability probe may use
    pub max_probe_attempts: u32,
    /// Blocks per request for optical media whose first block is unreadable
    pub optical_transfer_blocks: u32,
    /// Seed for the random trial addresses (entropy when unset)
    pub probe_seed: Option<u64>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            want_raw: false,
            initial_transfer_blocks: DEFAULT_TRANSFER_BLOCKS,
            max_probe_attempts: DEFAULT_PROBE_ATTEMPTS,
            optical_transfer_blocks: OPTICAL_TRANSFER_BLOCKS,
            probe_seed: None,
        }
    }
}

impl ReaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses options from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Sets the per-command timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    /// Enables raw read detection
    pub fn with_raw(mut self, want_raw: bool) -> Self {
        self.want_raw = want_raw;
        self
    }

    pub fn with_initial_transfer_blocks(mut self, blocks: u32) -> Self {
        self.initial_transfer_blocks = blocks;
        self
    }

    pub fn with_max_probe_attempts(mut self, attempts: u32) -> Self {
        self.max_probe_attempts = attempts;
        self
    }

    /// Makes random trial addresses reproducible
    pub fn with_probe_seed(mut self, seed: u64) -> Self {
        self.probe_seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ReaderOptions::default();
        assert_eq!(options.timeout(), Duration::from_secs(30));
        assert!(!options.want_raw);
        assert_eq!(options.initial_transfer_blocks, 64);
        assert_eq!(options.max_probe_attempts, 10);
        assert_eq!(options.optical_transfer_blocks, 16);
    }

    #[test]
    fn test_partial_json() {
        let options = ReaderOptions::from_json(r#"{"want_raw": true, "probe_seed": 7}"#).unwrap();
        assert!(options.want_raw);
        assert_eq!(options.probe_seed, Some(7));
        assert_eq!(options.timeout_ms, 30_000);
    }

    #[test]
    fn test_json_roundtrip() {
        let options = ReaderOptions::new()
            .with_timeout(Duration::from_secs(5))
            .with_initial_transfer_blocks(32);
        let json = serde_json::to_string(&options).unwrap();
        assert_eq!(ReaderOptions::from_json(&json).unwrap(), options);
    }
}
