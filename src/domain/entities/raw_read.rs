//! Raw (long) read profile entity

use crate::domain::repositories::DeviceCommand;
use crate::protocol::scsi::{self, LBA21_MAX, LBA32_MAX};

/// Sector size the HL-DT-ST and Plextor raw DVD reads return.
pub const RAW_DVD_SECTOR_SIZE: u32 = 2064;
/// One DVD ECC block (16 sectors of 2366 bytes) as some DVD-ROM drives return it.
pub const DVD_ECC_BLOCK_SIZE: u32 = 37856;

/// Broad origin of a raw read command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawReadFamily {
    /// READ LONG from the SBC command set
    Generic,
    /// SyQuest removable disks
    SyQuest,
    /// Optical drive vendor commands returning raw DVD sectors
    VendorOptical,
    /// READ LONG of a whole DVD ECC block
    VendorDvd,
}

/// The command a raw read is issued with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawReadCommand {
    ReadLong10,
    ReadLong16,
    SyQuestReadLong10,
    SyQuestReadLong6,
    HlDtStReadRawDvd,
    PlextorReadRawDvd,
    DvdEccBlockReadLong10,
}

impl RawReadCommand {
    pub fn family(self) -> RawReadFamily {
        match self {
            RawReadCommand::ReadLong10 | RawReadCommand::ReadLong16 => RawReadFamily::Generic,
            RawReadCommand::SyQuestReadLong10 | RawReadCommand::SyQuestReadLong6 => {
                RawReadFamily::SyQuest
            }
            RawReadCommand::HlDtStReadRawDvd | RawReadCommand::PlextorReadRawDvd => {
                RawReadFamily::VendorOptical
            }
            RawReadCommand::DvdEccBlockReadLong10 => RawReadFamily::VendorDvd,
        }
    }

    /// Largest block count one command can carry. READ LONG reads one block.
    pub fn max_blocks(self) -> u32 {
        match self {
            RawReadCommand::SyQuestReadLong10 | RawReadCommand::HlDtStReadRawDvd => {
                u16::MAX as u32
            }
            RawReadCommand::SyQuestReadLong6 => 256,
            RawReadCommand::PlextorReadRawDvd => 0x00FF_FFFF / RAW_DVD_SECTOR_SIZE,
            _ => 1,
        }
    }

    /// Encodes a raw read of `count` long blocks of `long_block_size` bytes.
    pub fn encode(self, lba: u64, count: u32, long_block_size: u32) -> Option<DeviceCommand> {
        if count == 0 || count > self.max_blocks() {
            return None;
        }
        let narrow = |limit: u64| (lba <= limit).then_some(lba as u32);
        let cdb = match self {
            RawReadCommand::ReadLong10 | RawReadCommand::DvdEccBlockReadLong10 => {
                scsi::read_long10(narrow(LBA32_MAX)?, u16::try_from(long_block_size).ok()?)
            }
            RawReadCommand::ReadLong16 => {
                scsi::read_long16(lba, u16::try_from(long_block_size).ok()?)
            }
            RawReadCommand::SyQuestReadLong10 => {
                scsi::syquest_read_long10(narrow(LBA32_MAX)?, count as u16)
            }
            RawReadCommand::SyQuestReadLong6 => {
                scsi::syquest_read_long6(narrow(LBA21_MAX)?, count as u8)
            }
            RawReadCommand::HlDtStReadRawDvd => {
                scsi::hldtst_read_raw_dvd(narrow(LBA32_MAX)?, count as u16)
            }
            RawReadCommand::PlextorReadRawDvd => {
                scsi::plextor_read_raw_dvd(narrow(LBA32_MAX)?, count * long_block_size)
            }
        };
        Some(DeviceCommand::Scsi(cdb))
    }
}

/// Whether, and how, a device returns over-size sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawReadProfile {
    pub supported: bool,
    /// Bytes per raw block; at least the logical block size when supported
    pub long_block_size: u32,
    pub command: Option<RawReadCommand>,
}

impl RawReadProfile {
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            long_block_size: 0,
            command: None,
        }
    }

    pub fn with(command: RawReadCommand, long_block_size: u32) -> Self {
        Self {
            supported: true,
            long_block_size,
            command: Some(command),
        }
    }
}
