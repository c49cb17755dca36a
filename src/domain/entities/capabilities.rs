//! Command capability entities
//!
//! Every concrete read and seek variant the reader knows how to issue, the
//! bitsets recording which ones a device honoured, and the one-time
//! selection of the preferred variant per operation.

use super::device::{AddressingMode, DeviceFamily};
use super::geometry::{BlockAddress, Geometry};
use crate::domain::repositories::DeviceCommand;
use crate::protocol::ata::{self, AtaTaskFile, AtaTaskFileExt, LBA28_MAX, LBA48_MAX};
use crate::protocol::scsi::{self, LBA21_MAX, LBA32_MAX};
use bitflags::bitflags;

bitflags! {
    /// Read variants that succeeded during probing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ReadSupport: u16 {
        const ATA_READ_CHS = 1 << 0;
        const ATA_READ_RETRY_CHS = 1 << 1;
        const ATA_READ_DMA_CHS = 1 << 2;
        const ATA_READ_DMA_RETRY_CHS = 1 << 3;
        const ATA_READ_LBA = 1 << 4;
        const ATA_READ_RETRY_LBA = 1 << 5;
        const ATA_READ_DMA_LBA = 1 << 6;
        const ATA_READ_DMA_RETRY_LBA = 1 << 7;
        const ATA_READ_LBA48 = 1 << 8;
        const ATA_READ_DMA_LBA48 = 1 << 9;
        const SCSI_READ6 = 1 << 10;
        const SCSI_READ10 = 1 << 11;
        const SCSI_READ12 = 1 << 12;
        const SCSI_READ16 = 1 << 13;
    }
}

bitflags! {
    /// Seek variants that succeeded during probing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SeekSupport: u8 {
        const ATA_SEEK_CHS = 1 << 0;
        const ATA_SEEK_LBA = 1 << 1;
        const SCSI_SEEK6 = 1 << 2;
        const SCSI_SEEK10 = 1 << 3;
    }
}

/// A concrete read command variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadCommand {
    AtaReadChs,
    AtaReadRetryChs,
    AtaReadDmaChs,
    AtaReadDmaRetryChs,
    AtaReadLba,
    AtaReadRetryLba,
    AtaReadDmaLba,
    AtaReadDmaRetryLba,
    AtaReadLba48,
    AtaReadDmaLba48,
    ScsiRead6,
    ScsiRead10,
    ScsiRead12,
    ScsiRead16,
}

/// ATA LBA preference, highest first.
const ATA_LBA_PRIORITY: [ReadCommand; 6] = [
    ReadCommand::AtaReadDmaLba48,
    ReadCommand::AtaReadLba48,
    ReadCommand::AtaReadDmaRetryLba,
    ReadCommand::AtaReadDmaLba,
    ReadCommand::AtaReadRetryLba,
    ReadCommand::AtaReadLba,
];

/// ATA CHS preference, highest first.
const ATA_CHS_PRIORITY: [ReadCommand; 4] = [
    ReadCommand::AtaReadDmaRetryChs,
    ReadCommand::AtaReadDmaChs,
    ReadCommand::AtaReadRetryChs,
    ReadCommand::AtaReadChs,
];

/// SCSI preference, widest CDB first.
const SCSI_PRIORITY: [ReadCommand; 4] = [
    ReadCommand::ScsiRead16,
    ReadCommand::ScsiRead12,
    ReadCommand::ScsiRead10,
    ReadCommand::ScsiRead6,
];

impl ReadCommand {
    /// Every ATA read variant, in probing order.
    pub const ATA: [ReadCommand; 10] = [
        ReadCommand::AtaReadRetryChs,
        ReadCommand::AtaReadChs,
        ReadCommand::AtaReadDmaRetryChs,
        ReadCommand::AtaReadDmaChs,
        ReadCommand::AtaReadRetryLba,
        ReadCommand::AtaReadLba,
        ReadCommand::AtaReadDmaRetryLba,
        ReadCommand::AtaReadDmaLba,
        ReadCommand::AtaReadLba48,
        ReadCommand::AtaReadDmaLba48,
    ];

    /// Every SCSI read variant, in probing order.
    pub const SCSI: [ReadCommand; 4] = [
        ReadCommand::ScsiRead6,
        ReadCommand::ScsiRead10,
        ReadCommand::ScsiRead12,
        ReadCommand::ScsiRead16,
    ];

    pub fn for_family(family: DeviceFamily) -> &'static [ReadCommand] {
        match family {
            DeviceFamily::Ata => &Self::ATA,
            DeviceFamily::Scsi => &Self::SCSI,
            DeviceFamily::Unsupported => &[],
        }
    }

    pub fn flag(self) -> ReadSupport {
        match self {
            ReadCommand::AtaReadChs => ReadSupport::ATA_READ_CHS,
            ReadCommand::AtaReadRetryChs => ReadSupport::ATA_READ_RETRY_CHS,
            ReadCommand::AtaReadDmaChs => ReadSupport::ATA_READ_DMA_CHS,
            ReadCommand::AtaReadDmaRetryChs => ReadSupport::ATA_READ_DMA_RETRY_CHS,
            ReadCommand::AtaReadLba => ReadSupport::ATA_READ_LBA,
            ReadCommand::AtaReadRetryLba => ReadSupport::ATA_READ_RETRY_LBA,
            ReadCommand::AtaReadDmaLba => ReadSupport::ATA_READ_DMA_LBA,
            ReadCommand::AtaReadDmaRetryLba => ReadSupport::ATA_READ_DMA_RETRY_LBA,
            ReadCommand::AtaReadLba48 => ReadSupport::ATA_READ_LBA48,
            ReadCommand::AtaReadDmaLba48 => ReadSupport::ATA_READ_DMA_LBA48,
            ReadCommand::ScsiRead6 => ReadSupport::SCSI_READ6,
            ReadCommand::ScsiRead10 => ReadSupport::SCSI_READ10,
            ReadCommand::ScsiRead12 => ReadSupport::SCSI_READ12,
            ReadCommand::ScsiRead16 => ReadSupport::SCSI_READ16,
        }
    }

    /// ATA addressing the variant uses; `None` for SCSI.
    pub fn addressing(self) -> Option<AddressingMode> {
        match self {
            ReadCommand::AtaReadChs
            | ReadCommand::AtaReadRetryChs
            | ReadCommand::AtaReadDmaChs
            | ReadCommand::AtaReadDmaRetryChs => Some(AddressingMode::Chs),
            ReadCommand::AtaReadLba
            | ReadCommand::AtaReadRetryLba
            | ReadCommand::AtaReadDmaLba
            | ReadCommand::AtaReadDmaRetryLba => Some(AddressingMode::Lba28),
            ReadCommand::AtaReadLba48 | ReadCommand::AtaReadDmaLba48 => {
                Some(AddressingMode::Lba48)
            }
            _ => None,
        }
    }

    pub fn is_chs(self) -> bool {
        self.addressing() == Some(AddressingMode::Chs)
    }

    pub fn opcode(self) -> u8 {
        match self {
            ReadCommand::AtaReadChs | ReadCommand::AtaReadLba => ata::READ_SECTORS,
            ReadCommand::AtaReadRetryChs | ReadCommand::AtaReadRetryLba => {
                ata::READ_SECTORS_RETRY
            }
            ReadCommand::AtaReadDmaChs | ReadCommand::AtaReadDmaLba => ata::READ_DMA,
            ReadCommand::AtaReadDmaRetryChs | ReadCommand::AtaReadDmaRetryLba => {
                ata::READ_DMA_RETRY
            }
            ReadCommand::AtaReadLba48 => ata::READ_SECTORS_EXT,
            ReadCommand::AtaReadDmaLba48 => ata::READ_DMA_EXT,
            ReadCommand::ScsiRead6 => scsi::READ_6,
            ReadCommand::ScsiRead10 => scsi::READ_10,
            ReadCommand::ScsiRead12 => scsi::READ_12,
            ReadCommand::ScsiRead16 => scsi::READ_16,
        }
    }

    /// Highest linear address the variant can carry. CHS variants are
    /// bounded by the CHS geometry instead and report the 28-bit limit.
    pub fn max_lba(self) -> u64 {
        match self {
            ReadCommand::AtaReadLba48 | ReadCommand::AtaReadDmaLba48 => LBA48_MAX,
            ReadCommand::ScsiRead6 => LBA21_MAX,
            ReadCommand::ScsiRead10 | ReadCommand::ScsiRead12 => LBA32_MAX,
            ReadCommand::ScsiRead16 => u64::MAX,
            _ => LBA28_MAX,
        }
    }

    /// Largest block count a single command can carry.
    pub fn max_blocks(self) -> u32 {
        match self {
            ReadCommand::AtaReadLba48 | ReadCommand::AtaReadDmaLba48 => 65536,
            ReadCommand::ScsiRead10 => u16::MAX as u32,
            ReadCommand::ScsiRead12 | ReadCommand::ScsiRead16 => u32::MAX,
            _ => 256,
        }
    }

    /// True when the variant can reach every block of the device.
    pub fn covers(self, geometry: &Geometry) -> bool {
        self.is_chs() || self.max_lba() >= geometry.last_block()
    }

    /// Encodes the command for `count` blocks at `address`.
    ///
    /// Returns `None` when the address kind does not match the variant, or
    /// the address or count do not fit its fields.
    pub fn encode(self, address: BlockAddress, count: u32) -> Option<DeviceCommand> {
        if count == 0 || count > self.max_blocks() {
            return None;
        }
        let opcode = self.opcode();
        match (self.addressing(), address) {
            (Some(AddressingMode::Chs), BlockAddress::Chs(chs)) => {
                if chs.sector == 0 || chs.head > 0x0F {
                    return None;
                }
                Some(DeviceCommand::Ata(AtaTaskFile::chs(
                    opcode,
                    chs.cylinder,
                    chs.head,
                    chs.sector,
                    count as u8,
                )))
            }
            (Some(AddressingMode::Lba28), BlockAddress::Lba(lba)) if lba <= LBA28_MAX => Some(
                DeviceCommand::Ata(AtaTaskFile::lba28(opcode, lba as u32, count as u8)),
            ),
            (Some(AddressingMode::Lba48), BlockAddress::Lba(lba)) if lba <= LBA48_MAX => Some(
                DeviceCommand::AtaExt(AtaTaskFileExt::lba48(opcode, lba, count as u16)),
            ),
            (None, BlockAddress::Lba(lba)) if lba <= self.max_lba() => {
                let cdb = match self {
                    ReadCommand::ScsiRead6 => scsi::read6(lba as u32, count as u8),
                    ReadCommand::ScsiRead10 => scsi::read10(lba as u32, count as u16),
                    ReadCommand::ScsiRead12 => scsi::read12(lba as u32, count),
                    _ => scsi::read16(lba, count),
                };
                Some(DeviceCommand::Scsi(cdb))
            }
            _ => None,
        }
    }
}

/// A concrete seek command variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeekCommand {
    AtaSeekChs,
    AtaSeekLba,
    ScsiSeek6,
    ScsiSeek10,
}

impl SeekCommand {
    pub fn for_family(family: DeviceFamily) -> &'static [SeekCommand] {
        match family {
            DeviceFamily::Ata => &[SeekCommand::AtaSeekChs, SeekCommand::AtaSeekLba],
            DeviceFamily::Scsi => &[SeekCommand::ScsiSeek6, SeekCommand::ScsiSeek10],
            DeviceFamily::Unsupported => &[],
        }
    }

    pub fn flag(self) -> SeekSupport {
        match self {
            SeekCommand::AtaSeekChs => SeekSupport::ATA_SEEK_CHS,
            SeekCommand::AtaSeekLba => SeekSupport::ATA_SEEK_LBA,
            SeekCommand::ScsiSeek6 => SeekSupport::SCSI_SEEK6,
            SeekCommand::ScsiSeek10 => SeekSupport::SCSI_SEEK10,
        }
    }

    pub fn is_chs(self) -> bool {
        self == SeekCommand::AtaSeekChs
    }

    /// Highest LBA the address field can carry.
    pub fn max_lba(self) -> u64 {
        match self {
            SeekCommand::AtaSeekChs => u64::MAX,
            SeekCommand::AtaSeekLba => LBA28_MAX,
            SeekCommand::ScsiSeek6 => LBA21_MAX,
            SeekCommand::ScsiSeek10 => LBA32_MAX,
        }
    }

    /// True when the variant can reach every block of the device.
    pub fn covers(self, geometry: &Geometry) -> bool {
        self.max_lba() >= geometry.last_block()
    }

    /// Encodes the seek, or `None` when the address does not fit.
    pub fn encode(self, address: BlockAddress) -> Option<DeviceCommand> {
        match (self, address) {
            (SeekCommand::AtaSeekChs, BlockAddress::Chs(chs)) if chs.sector > 0 && chs.head <= 0x0F => {
                Some(DeviceCommand::Ata(AtaTaskFile::chs(
                    ata::SEEK,
                    chs.cylinder,
                    chs.head,
                    chs.sector,
                    0,
                )))
            }
            (SeekCommand::AtaSeekLba, BlockAddress::Lba(lba)) if lba <= LBA28_MAX => Some(
                DeviceCommand::Ata(AtaTaskFile::lba28(ata::SEEK, lba as u32, 0)),
            ),
            (SeekCommand::ScsiSeek6, BlockAddress::Lba(lba)) if lba <= LBA21_MAX => {
                Some(DeviceCommand::Scsi(scsi::seek6(lba as u32)))
            }
            (SeekCommand::ScsiSeek10, BlockAddress::Lba(lba)) if lba <= LBA32_MAX => {
                Some(DeviceCommand::Scsi(scsi::seek10(lba as u32)))
            }
            _ => None,
        }
    }
}

/// The commands a device honoured, and the variants chosen from them.
///
/// Built once by the capability probe and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCapabilities {
    reads: ReadSupport,
    seeks: SeekSupport,
    preferred_read: Option<ReadCommand>,
    preferred_chs_read: Option<ReadCommand>,
    preferred_seek: Option<SeekCommand>,
    preferred_chs_seek: Option<SeekCommand>,
}

impl CommandCapabilities {
    /// Applies the priority tables to the probed support sets.
    ///
    /// Variants whose address width cannot reach the last block of the
    /// device are never preferred.
    pub fn select(
        family: DeviceFamily,
        geometry: &Geometry,
        reads: ReadSupport,
        seeks: SeekSupport,
    ) -> Self {
        let pick = |table: &[ReadCommand]| {
            table
                .iter()
                .copied()
                .find(|cmd| reads.contains(cmd.flag()) && cmd.covers(geometry))
        };
        let has_seek = |cmd: SeekCommand| {
            (seeks.contains(cmd.flag()) && cmd.covers(geometry)).then_some(cmd)
        };

        let (preferred_read, preferred_chs_read, preferred_seek, preferred_chs_seek) = match family
        {
            DeviceFamily::Ata => {
                let chs_read = pick(&ATA_CHS_PRIORITY);
                let chs_seek = has_seek(SeekCommand::AtaSeekChs);
                match geometry.addressing {
                    Some(AddressingMode::Chs) | None => (chs_read, chs_read, chs_seek, chs_seek),
                    Some(_) => (
                        pick(&ATA_LBA_PRIORITY),
                        chs_read,
                        has_seek(SeekCommand::AtaSeekLba),
                        chs_seek,
                    ),
                }
            }
            DeviceFamily::Scsi => (
                pick(&SCSI_PRIORITY),
                None,
                has_seek(SeekCommand::ScsiSeek10).or(has_seek(SeekCommand::ScsiSeek6)),
                None,
            ),
            DeviceFamily::Unsupported => (None, None, None, None),
        };

        Self {
            reads,
            seeks,
            preferred_read,
            preferred_chs_read,
            preferred_seek,
            preferred_chs_seek,
        }
    }

    pub fn reads(&self) -> ReadSupport {
        self.reads
    }

    pub fn seeks(&self) -> SeekSupport {
        self.seeks
    }

    pub fn supports_read(&self, command: ReadCommand) -> bool {
        self.reads.contains(command.flag())
    }

    pub fn supports_seek(&self, command: SeekCommand) -> bool {
        self.seeks.contains(command.flag())
    }

    /// The read variant every block read uses.
    pub fn preferred_read(&self) -> Option<ReadCommand> {
        self.preferred_read
    }

    /// The CHS read variant used for explicit CHS reads (ATA only).
    pub fn preferred_chs_read(&self) -> Option<ReadCommand> {
        self.preferred_chs_read
    }

    pub fn preferred_seek(&self) -> Option<SeekCommand> {
        self.preferred_seek
    }

    pub fn preferred_chs_seek(&self) -> Option<SeekCommand> {
        self.preferred_chs_seek
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Chs, ChsGeometry};

    fn ata_geometry(total_blocks: u64, addressing: AddressingMode) -> Geometry {
        Geometry {
            logical_block_size: 512,
            physical_block_size: 512,
            total_blocks,
            chs: Some(ChsGeometry {
                cylinders: 16383,
                heads: 16,
                sectors_per_track: 63,
            }),
            addressing: Some(addressing),
            capacity_known: true,
        }
    }

    fn scsi_geometry(total_blocks: u64) -> Geometry {
        Geometry {
            logical_block_size: 512,
            physical_block_size: 512,
            total_blocks,
            chs: None,
            addressing: None,
            capacity_known: true,
        }
    }

    #[test]
    fn test_lba48_dma_beats_everything() {
        let reads = ReadSupport::ATA_READ_DMA_LBA48 | ReadSupport::ATA_READ_LBA;
        let caps = CommandCapabilities::select(
            DeviceFamily::Ata,
            &ata_geometry(5_000_000, AddressingMode::Lba48),
            reads,
            SeekSupport::empty(),
        );
        assert_eq!(caps.preferred_read(), Some(ReadCommand::AtaReadDmaLba48));
        assert_eq!(caps.preferred_seek(), None);
    }

    #[test]
    fn test_lba28_disqualified_beyond_28_bits() {
        let caps = CommandCapabilities::select(
            DeviceFamily::Ata,
            &ata_geometry(LBA28_MAX + 2, AddressingMode::Lba48),
            ReadSupport::ATA_READ_DMA_LBA | ReadSupport::ATA_READ_LBA,
            SeekSupport::empty(),
        );
        assert_eq!(caps.preferred_read(), None);
    }

    #[test]
    fn test_chs_priority() {
        let caps = CommandCapabilities::select(
            DeviceFamily::Ata,
            &ata_geometry(1000, AddressingMode::Chs),
            ReadSupport::ATA_READ_CHS | ReadSupport::ATA_READ_DMA_CHS,
            SeekSupport::ATA_SEEK_CHS,
        );
        assert_eq!(caps.preferred_read(), Some(ReadCommand::AtaReadDmaChs));
        assert_eq!(caps.preferred_seek(), Some(SeekCommand::AtaSeekChs));
    }

    #[test]
    fn test_scsi_read6_disqualified_on_large_device() {
        let reads = ReadSupport::SCSI_READ6;
        let small = CommandCapabilities::select(
            DeviceFamily::Scsi,
            &scsi_geometry(1000),
            reads,
            SeekSupport::empty(),
        );
        assert_eq!(small.preferred_read(), Some(ReadCommand::ScsiRead6));

        let large = CommandCapabilities::select(
            DeviceFamily::Scsi,
            &scsi_geometry(LBA21_MAX + 2),
            reads,
            SeekSupport::empty(),
        );
        assert_eq!(large.preferred_read(), None);
    }

    #[test]
    fn test_scsi_prefers_widest_cdb() {
        let caps = CommandCapabilities::select(
            DeviceFamily::Scsi,
            &scsi_geometry(1000),
            ReadSupport::SCSI_READ10 | ReadSupport::SCSI_READ12 | ReadSupport::SCSI_READ6,
            SeekSupport::SCSI_SEEK6 | SeekSupport::SCSI_SEEK10,
        );
        assert_eq!(caps.preferred_read(), Some(ReadCommand::ScsiRead12));
        assert_eq!(caps.preferred_seek(), Some(SeekCommand::ScsiSeek10));
    }

    #[test]
    fn test_narrow_seeks_disqualified_on_large_device() {
        let caps = CommandCapabilities::select(
            DeviceFamily::Ata,
            &ata_geometry(LBA28_MAX + 101, AddressingMode::Lba48),
            ReadSupport::ATA_READ_DMA_LBA48,
            SeekSupport::ATA_SEEK_LBA | SeekSupport::ATA_SEEK_CHS,
        );
        assert_eq!(caps.preferred_seek(), None);
        assert!(caps.supports_seek(SeekCommand::AtaSeekLba));
        assert_eq!(caps.preferred_chs_seek(), Some(SeekCommand::AtaSeekChs));
    }

    #[test]
    fn test_encode_rejects_mismatched_address() {
        assert!(ReadCommand::AtaReadLba.encode(BlockAddress::Chs(Chs::new(0, 0, 1)), 1).is_none());
        assert!(ReadCommand::AtaReadChs.encode(BlockAddress::Lba(0), 1).is_none());
        assert!(ReadCommand::ScsiRead6.encode(BlockAddress::Lba(LBA21_MAX + 1), 1).is_none());
        assert!(ReadCommand::ScsiRead10.encode(BlockAddress::Lba(0), 65536).is_none());
    }

    #[test]
    fn test_encode_256_sectors_wraps_to_zero() {
        match ReadCommand::AtaReadLba.encode(BlockAddress::Lba(10), 256) {
            Some(DeviceCommand::Ata(tf)) => {
                assert_eq!(tf.sector_count, 0);
                assert_eq!(tf.sectors(), 256);
            }
            other => panic!("unexpected encoding {other:?}"),
        }
    }
}
