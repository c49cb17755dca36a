//! Device family and identity entities
//!
//! What the reader knows about a device before it issues a single command.

use crate::protocol::{AtaIdentify, InquiryData, PeripheralType};
use std::fmt;

/// Command set family a device is driven through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFamily {
    /// Plain ATA task-file devices
    Ata,
    /// SCSI devices, and ATAPI devices speaking SCSI CDBs through packets
    Scsi,
    /// Anything else; a reader cannot be built for it
    Unsupported,
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceFamily::Ata => write!(f, "ATA"),
            DeviceFamily::Scsi => write!(f, "SCSI/ATAPI"),
            DeviceFamily::Unsupported => write!(f, "Unsupported"),
        }
    }
}

/// ATA addressing modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    Chs,
    Lba28,
    Lba48,
}

impl AddressingMode {
    pub fn describe(&self) -> &'static str {
        match self {
            AddressingMode::Chs => "CHS",
            AddressingMode::Lba28 => "28-bit LBA",
            AddressingMode::Lba48 => "48-bit LBA",
        }
    }
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Self-description captured when the device was opened.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceIdentity {
    /// Vendor string, used to match vendor quirks
    pub manufacturer: String,
    pub model: String,
    pub revision: String,
    /// Peripheral type; ATA disks report `DirectAccess`
    pub peripheral_type: PeripheralType,
    /// IDENTIFY DEVICE data, present for ATA devices
    pub ata: Option<AtaIdentify>,
}

impl DeviceIdentity {
    /// Identity of an ATA device.
    ///
    /// ATA has no separate vendor field; the first word of the model string
    /// stands in for it when the model has more than one word.
    pub fn from_ata(identify: AtaIdentify) -> Self {
        let (manufacturer, model) = match identify.model.split_once(' ') {
            Some((vendor, rest)) if !rest.trim().is_empty() => {
                (vendor.to_string(), rest.trim().to_string())
            }
            _ => (String::new(), identify.model.clone()),
        };
        Self {
            manufacturer,
            model,
            revision: identify.firmware.clone(),
            peripheral_type: PeripheralType::DirectAccess,
            ata: Some(identify),
        }
    }

    /// Identity of a SCSI or ATAPI device.
    pub fn from_inquiry(inquiry: InquiryData) -> Self {
        Self {
            manufacturer: inquiry.vendor,
            model: inquiry.product,
            revision: inquiry.revision,
            peripheral_type: inquiry.peripheral_type,
            ata: None,
        }
    }

    /// Case-insensitive prefix match on the manufacturer string.
    pub fn manufacturer_matches(&self, vendor: &str) -> bool {
        self.manufacturer
            .trim()
            .get(..vendor.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(vendor))
    }

    pub fn is_optical(&self) -> bool {
        self.peripheral_type.is_optical()
    }
}
