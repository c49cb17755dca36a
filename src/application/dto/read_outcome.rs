//! Results of reads and seeks

use std::time::Duration;

/// Data returned by a successful read
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReadOutcome {
    pub data: Vec<u8>,
    /// Time the device took, as reported by the transport
    pub duration: Duration,
    /// The device corrected an error while reading
    pub recovered_error: bool,
    /// The blocks are unwritten; `data` is zero-filled
    pub blank_check: bool,
}

/// Result of a successful seek
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeekOutcome {
    pub duration: Duration,
    pub recovered_error: bool,
}
