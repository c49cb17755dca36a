//! Error types

use thiserror::Error;

use crate::domain::entities::ReadCommand;

/// Errors surfaced by the block reader.
///
/// The first five variants are fatal: they are discovered while probing the
/// device and prevent any usable read path. The rest are per-call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    #[error("Unsupported device family")]
    UnsupportedDevice,

    #[error("ATA device opened without IDENTIFY data")]
    MissingIdentify,

    #[error("Geometry unresolvable: {0}")]
    GeometryUnresolvable(String),

    #[error("No working read command after {attempts} address attempts")]
    NoWorkingReadCommand { attempts: u32 },

    #[error("Device needs {required} addressing but no read command for it works")]
    AddressingUnavailable { required: &'static str },

    #[error("Not supported: {0}")]
    NotSupported(&'static str),

    #[error("Block {block} is out of range (device has {total} blocks)")]
    OutOfRange { block: u64, total: u64 },

    #[error("Transfer of {count} blocks does not fit {command:?} (limit {limit})")]
    TransferTooLong {
        command: ReadCommand,
        count: u32,
        limit: u32,
    },

    #[error("Transport failure at block {address}: status {status_code:#04x}, error {error_code:#06x}")]
    TransportFailure {
        address: u64,
        status_code: u32,
        error_code: u32,
        raw: Vec<u8>,
    },
}

impl ReaderError {
    /// True for errors that abort construction of a reader.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedDevice
                | Self::MissingIdentify
                | Self::GeometryUnresolvable(_)
                | Self::NoWorkingReadCommand { .. }
                | Self::AddressingUnavailable { .. }
        )
    }
}

/// Non-fatal conditions recorded while probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// Even single-block trial reads failed; the device is read one block at a time.
    TransferDegraded,
    /// No raw (long) read command could be established.
    RawUnsupported,
    /// The device did not report its capacity; block count is provisional.
    CapacityUnknown,
}

pub type Result<T> = std::result::Result<T, ReaderError>;
