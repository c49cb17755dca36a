//! Error log trait
//!
//! Fire-and-forget sink for per-call read failures, kept for post-mortem
//! analysis of a dump. A failing sink never fails the read that fed it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a sink may report. The reader logs and discards them.
#[derive(Error, Debug)]
pub enum ErrorLogError {
    #[error("Error log unavailable: {0}")]
    Unavailable(String),
}

/// One failed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Block the command was aimed at
    pub address: u64,
    /// ATA status register, or SCSI sense key
    pub status_code: u32,
    /// ATA error register, or SCSI ASC/ASCQ as `asc << 8 | ascq`
    pub error_code: u32,
    /// Raw status registers or sense bytes
    pub raw: Vec<u8>,
}

pub trait ErrorLog: Send + Sync {
    fn record(&self, record: &ErrorRecord) -> Result<(), ErrorLogError>;
}
