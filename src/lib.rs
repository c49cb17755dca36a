//! Adaptive block reader for ATA and SCSI/ATAPI devices.
//!
//! Given an opened device of unknown capabilities, [`BlockReader`] works out
//! which read and seek commands the device honours, its block geometry, the
//! largest transfer it accepts and whether it can return raw (long) sectors.
//! Reads then go through the best command found.
//!
//! ```ignore
//! use rawprobe::{BlockReader, DeviceFamily, DeviceIdentity, ReaderOptions};
//!
//! let identity = DeviceIdentity::from_inquiry(inquiry);
//! let mut reader = BlockReader::open(transport, DeviceFamily::Scsi, identity, ReaderOptions::default());
//! let first = reader.read_blocks(0, reader.blocks_per_request()?)?;
//! ```

pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod protocol;

pub use application::dto::{ReadOutcome, ReaderOptions, SeekOutcome};
pub use application::{BlockReader, ReaderStage};
pub use domain::entities::{
    AddressingMode, BlockAddress, Chs, ChsGeometry, CommandCapabilities, DeviceFamily,
    DeviceIdentity, Geometry, RawReadCommand, RawReadProfile, ReadCommand, ReadSupport,
    SeekCommand, SeekSupport, TransferTuning,
};
pub use domain::repositories::{
    CommandOutcome, CommandTransport, DataDirection, DeviceCommand, ErrorLog, ErrorLogError,
    ErrorRecord, SenseClass, SenseClassifier,
};
pub use domain::services::{QuirkScope, RawProbe, RawProbeStrategy, VendorQuirkRegistry};
pub use error::{Diagnostic, ReaderError, Result};
pub use infrastructure::{MemoryErrorLog, ScsiSenseClassifier, TracingErrorLog};
