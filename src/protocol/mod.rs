//! Wire-level encodings for the ATA and SCSI command sets.
//!
//! Everything here is pure data: task files, CDBs, and parsers for the
//! responses the reader inspects. Nothing in this module issues commands.

pub mod ata;
pub mod scsi;
pub mod sense;

pub use ata::{AtaIdentify, AtaStatus, AtaTaskFile, AtaTaskFileExt};
pub use scsi::{Capacity, Cdb, InquiryData, PeripheralType};
pub use sense::SenseData;
