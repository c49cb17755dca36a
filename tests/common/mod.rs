//! Simulated devices shared by the integration tests
//!
//! Each simulator decodes the task files and CDBs it receives the way a real
//! drive would and answers from a configurable model of the medium. Every
//! command is appended to a shared journal for inspection.

#![allow(dead_code)]

use parking_lot::Mutex;
use rawprobe::domain::entities::{Chs, ChsGeometry};
use rawprobe::protocol::ata::{self, AtaIdentify, AtaStatus};
use rawprobe::protocol::scsi::{self, Cdb, InquiryData, LBA21_MAX, LBA32_MAX, PeripheralType};
use rawprobe::protocol::sense::{self, fixed_sense};
use rawprobe::{CommandOutcome, CommandTransport, DataDirection, DeviceCommand, DeviceIdentity};
use std::collections::HashSet;
use std::sync::{Arc, Once};
use std::time::Duration;

pub const COMMAND_TIME: Duration = Duration::from_millis(2);

static TRACING: Once = Once::new();

/// Routes tracing output through the test harness.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Content of every block: its address, repeated.
pub fn block_pattern(lba: u64, block_size: usize) -> Vec<u8> {
    lba.to_le_bytes().iter().copied().cycle().take(block_size).collect()
}

pub fn blocks_pattern(start: u64, count: u64, block_size: usize) -> Vec<u8> {
    (start..start + count)
        .flat_map(|lba| block_pattern(lba, block_size))
        .collect()
}

// ============================================================================
// Journal
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub command: DeviceCommand,
    pub direction: DataDirection,
    pub timeout: Duration,
}

/// Commands a simulator received, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<JournalEntry>>>);

impl Journal {
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    /// Entries whose opcode is one of `opcodes`.
    pub fn with_opcodes(&self, opcodes: &[u8]) -> Vec<JournalEntry> {
        self.0
            .lock()
            .iter()
            .filter(|entry| opcodes.contains(&entry.command.opcode()))
            .cloned()
            .collect()
    }

    fn push(&self, command: &DeviceCommand, direction: &DataDirection, timeout: Duration) {
        self.0.lock().push(JournalEntry {
            command: command.clone(),
            direction: direction.clone(),
            timeout,
        });
    }
}

// ============================================================================
// ATA disk
// ============================================================================

pub const ATA_READS: [u8; 6] = [
    ata::READ_SECTORS_RETRY,
    ata::READ_SECTORS,
    ata::READ_DMA_RETRY,
    ata::READ_DMA,
    ata::READ_SECTORS_EXT,
    ata::READ_DMA_EXT,
];

#[derive(Debug, Clone)]
pub struct SimulatedAtaDisk {
    pub identify: AtaIdentify,
    /// Opcodes the drive honours; everything else is aborted
    pub opcodes: HashSet<u8>,
    pub total_sectors: u64,
    pub chs: ChsGeometry,
    /// Largest sector count accepted in one command
    pub max_sectors: u32,
    pub recovered: HashSet<u64>,
    pub unreadable: HashSet<u64>,
    pub journal: Journal,
}

impl SimulatedAtaDisk {
    /// A drive that addresses LBA48 and honours every command.
    pub fn lba48(total_sectors: u64) -> Self {
        let chs = ChsGeometry {
            cylinders: 16383,
            heads: 16,
            sectors_per_track: 63,
        };
        let identify = AtaIdentify {
            model: "WDC WD5000AAKX".to_string(),
            serial: "WD-0001".to_string(),
            firmware: "15.01H15".to_string(),
            default_cylinders: chs.cylinders,
            default_heads: chs.heads,
            default_sectors_per_track: chs.sectors_per_track,
            current_cylinders: chs.cylinders,
            current_heads: chs.heads,
            current_sectors_per_track: chs.sectors_per_track,
            lba_supported: true,
            dma_supported: true,
            lba28_sectors: total_sectors.min(ata::LBA28_MAX) as u32,
            lba48_supported: true,
            lba48_sectors: total_sectors,
            logical_sector_size: 512,
            physical_sector_size: 512,
        };
        Self::with_identify(identify, chs, total_sectors)
    }

    /// A drive that only knows CHS addressing.
    pub fn chs_only(cylinders: u16, heads: u16, sectors_per_track: u16) -> Self {
        let chs = ChsGeometry {
            cylinders,
            heads,
            sectors_per_track,
        };
        let identify = AtaIdentify {
            model: "CONNER CP3044".to_string(),
            default_cylinders: cylinders,
            default_heads: heads,
            default_sectors_per_track: sectors_per_track,
            logical_sector_size: 512,
            physical_sector_size: 512,
            ..Default::default()
        };
        let mut disk = Self::with_identify(identify, chs, chs.total_sectors());
        disk.opcodes = [ata::READ_SECTORS_RETRY, ata::READ_SECTORS, ata::SEEK]
            .into_iter()
            .collect();
        disk
    }

    fn with_identify(identify: AtaIdentify, chs: ChsGeometry, total_sectors: u64) -> Self {
        Self {
            identify,
            opcodes: ATA_READS.iter().copied().chain([ata::SEEK]).collect(),
            total_sectors,
            chs,
            max_sectors: 65536,
            recovered: HashSet::new(),
            unreadable: HashSet::new(),
            journal: Journal::default(),
        }
    }

    pub fn without(mut self, opcodes: &[u8]) -> Self {
        for opcode in opcodes {
            self.opcodes.remove(opcode);
        }
        self
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::from_ata(self.identify.clone())
    }

    fn status(status: u8, error: u8) -> Vec<u8> {
        AtaStatus { status, error }.to_bytes()
    }

    fn abort() -> CommandOutcome {
        CommandOutcome::failed(
            Self::status(AtaStatus::DRDY | AtaStatus::ERR, AtaStatus::ABRT),
            COMMAND_TIME,
        )
    }

    fn not_found() -> CommandOutcome {
        CommandOutcome::failed(
            Self::status(AtaStatus::DRDY | AtaStatus::ERR, AtaStatus::IDNF),
            COMMAND_TIME,
        )
    }

    fn execute(&self, opcode: u8, lba: Option<u64>, sectors: u32) -> CommandOutcome {
        if !self.opcodes.contains(&opcode) {
            return Self::abort();
        }
        let Some(lba) = lba else {
            return Self::not_found();
        };
        if opcode == ata::SEEK {
            return if lba < self.total_sectors {
                CommandOutcome {
                    success: true,
                    status: Self::status(AtaStatus::DRDY | AtaStatus::DSC, 0),
                    data: Vec::new(),
                    duration: COMMAND_TIME,
                }
            } else {
                Self::not_found()
            };
        }
        if sectors > self.max_sectors {
            return Self::abort();
        }
        if lba + sectors as u64 > self.total_sectors {
            return Self::not_found();
        }
        let range = lba..lba + sectors as u64;
        if range.clone().any(|block| self.unreadable.contains(&block)) {
            return CommandOutcome::failed(
                Self::status(AtaStatus::DRDY | AtaStatus::ERR, AtaStatus::UNC),
                COMMAND_TIME,
            );
        }
        let corrected = range.clone().any(|block| self.recovered.contains(&block));
        let status = if corrected {
            AtaStatus::DRDY | AtaStatus::DSC | AtaStatus::CORR
        } else {
            AtaStatus::DRDY | AtaStatus::DSC
        };
        CommandOutcome {
            success: true,
            status: Self::status(status, 0),
            data: blocks_pattern(lba, sectors as u64, 512),
            duration: COMMAND_TIME,
        }
    }
}

impl CommandTransport for SimulatedAtaDisk {
    fn issue(
        &mut self,
        command: &DeviceCommand,
        direction: DataDirection,
        timeout: Duration,
    ) -> CommandOutcome {
        self.journal.push(command, &direction, timeout);
        match command {
            DeviceCommand::Ata(tf) => {
                let is_ext = matches!(tf.command, ata::READ_SECTORS_EXT | ata::READ_DMA_EXT);
                if is_ext {
                    return Self::abort();
                }
                let lba = if tf.is_lba() {
                    if !self.identify.lba_supported {
                        return Self::abort();
                    }
                    Some(tf.lba() as u64)
                } else {
                    let (cylinder, head, sector) = tf.chs_address();
                    self.chs.to_lba(Chs::new(cylinder, head, sector))
                };
                self.execute(tf.command, lba, tf.sectors())
            }
            DeviceCommand::AtaExt(tf) => {
                if !self.identify.lba48_supported
                    || !matches!(tf.command, ata::READ_SECTORS_EXT | ata::READ_DMA_EXT)
                {
                    return Self::abort();
                }
                self.execute(tf.command, Some(tf.lba), tf.sectors())
            }
            DeviceCommand::Scsi(_) => Self::abort(),
        }
    }
}

// ============================================================================
// SCSI / ATAPI device
// ============================================================================

pub const SCSI_READS: [u8; 4] = [scsi::READ_6, scsi::READ_10, scsi::READ_12, scsi::READ_16];

#[derive(Debug, Clone)]
pub struct SimulatedScsiDisk {
    pub inquiry: InquiryData,
    pub block_size: u32,
    pub total_blocks: u64,
    pub capacity10: bool,
    pub capacity16: bool,
    /// Logical blocks per physical block, as a power of two
    pub physical_exponent: u8,
    /// Read and seek opcodes the device honours
    pub opcodes: HashSet<u8>,
    pub max_blocks: u32,
    /// When set, only these blocks hold data; all others are blank
    pub written: Option<HashSet<u64>>,
    pub blank: HashSet<u64>,
    pub recovered: HashSet<u64>,
    pub unreadable: HashSet<u64>,
    /// Block MEDIUM SCAN reports as written
    pub medium_scan: Option<u64>,
    /// Byte counts READ LONG(10) accepts; the first is the size it reports
    pub read_long10: Vec<u32>,
    /// Byte counts READ LONG(16) accepts
    pub read_long16: Vec<u32>,
    /// Long size the SyQuest vendor reads use
    pub syquest_long: Option<u32>,
    /// SyQuest READ(6) long reads accept this size without reporting it
    pub syquest_long6_fixed: Option<u32>,
    pub raw_dvd: bool,
    pub dvd_ecc_block: bool,
    pub journal: Journal,
}

impl SimulatedScsiDisk {
    /// A direct-access disk honouring every read command.
    pub fn disk(vendor: &str, block_size: u32, total_blocks: u64) -> Self {
        Self {
            inquiry: InquiryData {
                peripheral_type: PeripheralType::DirectAccess,
                removable: false,
                vendor: vendor.to_string(),
                product: "SIMULATED DISK".to_string(),
                revision: "1.00".to_string(),
            },
            block_size,
            total_blocks,
            capacity10: true,
            capacity16: true,
            physical_exponent: 0,
            opcodes: SCSI_READS
                .iter()
                .copied()
                .chain([scsi::SEEK_6, scsi::SEEK_10])
                .collect(),
            max_blocks: u32::MAX,
            written: None,
            blank: HashSet::new(),
            recovered: HashSet::new(),
            unreadable: HashSet::new(),
            medium_scan: None,
            read_long10: Vec::new(),
            read_long16: Vec::new(),
            syquest_long: None,
            syquest_long6_fixed: None,
            raw_dvd: false,
            dvd_ecc_block: false,
            journal: Journal::default(),
        }
    }

    /// A CD/DVD drive with 2048-byte blocks.
    pub fn optical(vendor: &str, total_blocks: u64) -> Self {
        let mut drive = Self::disk(vendor, 2048, total_blocks);
        drive.inquiry.peripheral_type = PeripheralType::MultiMedia;
        drive.inquiry.removable = true;
        drive.inquiry.product = "DVD-ROM".to_string();
        drive
    }

    pub fn without(mut self, opcodes: &[u8]) -> Self {
        for opcode in opcodes {
            self.opcodes.remove(opcode);
        }
        self
    }

    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity::from_inquiry(self.inquiry.clone())
    }

    fn check(key: u8, asc: u8, ascq: u8) -> CommandOutcome {
        CommandOutcome::failed(fixed_sense(key, asc, ascq, None, false), COMMAND_TIME)
    }

    fn invalid_opcode() -> CommandOutcome {
        Self::check(sense::KEY_ILLEGAL_REQUEST, sense::ASC_INVALID_OPCODE, 0)
    }

    fn invalid_field() -> CommandOutcome {
        Self::check(sense::KEY_ILLEGAL_REQUEST, sense::ASC_INVALID_FIELD_IN_CDB, 0)
    }

    fn out_of_range() -> CommandOutcome {
        Self::check(sense::KEY_ILLEGAL_REQUEST, sense::ASC_LBA_OUT_OF_RANGE, 0)
    }

    fn is_blank(&self, lba: u64) -> bool {
        self.blank.contains(&lba)
            || self
                .written
                .as_ref()
                .is_some_and(|written| !written.contains(&lba))
    }

    /// Reads `blocks` blocks of `block_size` bytes each.
    fn read(&self, lba: u64, blocks: u64, block_size: u32) -> CommandOutcome {
        if blocks > self.max_blocks as u64 {
            return Self::invalid_field();
        }
        if lba + blocks > self.total_blocks {
            return Self::out_of_range();
        }
        let range = lba..lba + blocks;
        if range.clone().any(|block| self.unreadable.contains(&block)) {
            return Self::check(sense::KEY_MEDIUM_ERROR, 0x11, 0x00);
        }
        if range.clone().any(|block| self.is_blank(block)) {
            return Self::check(sense::KEY_BLANK_CHECK, 0x00, 0x00);
        }
        let data = blocks_pattern(lba, blocks, block_size as usize);
        if range.clone().any(|block| self.recovered.contains(&block)) {
            return CommandOutcome {
                success: true,
                status: fixed_sense(sense::KEY_RECOVERED_ERROR, 0x17, 0x01, None, false),
                data,
                duration: COMMAND_TIME,
            };
        }
        CommandOutcome::ok(data, COMMAND_TIME)
    }

    /// A cooked read; the host must ask for exactly the medium's block size.
    fn read_logical(&self, lba: u64, blocks: u64, direction: &DataDirection) -> CommandOutcome {
        if let DataDirection::In(bytes) = direction
            && *bytes as u64 != blocks * self.block_size as u64
        {
            return Self::invalid_field();
        }
        self.read(lba, blocks, self.block_size)
    }

    /// A long read of one block: accepted sizes return data, anything else
    /// is rejected with the residue in the information field.
    fn read_long(&self, lba: u64, requested: u32, accepted: &[u32]) -> CommandOutcome {
        let Some(&reported) = accepted.first() else {
            return Self::invalid_opcode();
        };
        if lba >= self.total_blocks {
            return Self::out_of_range();
        }
        if accepted.contains(&requested) {
            return CommandOutcome::ok(block_pattern(lba, requested as usize), COMMAND_TIME);
        }
        let residue = requested.wrapping_sub(reported);
        CommandOutcome::failed(
            fixed_sense(
                sense::KEY_ILLEGAL_REQUEST,
                sense::ASC_INVALID_FIELD_IN_CDB,
                0x00,
                Some(residue),
                true,
            ),
            COMMAND_TIME,
        )
    }

    fn capacity10(&self) -> CommandOutcome {
        if !self.capacity10 {
            return Self::invalid_opcode();
        }
        let max_lba = (self.total_blocks - 1).min(LBA32_MAX) as u32;
        let mut data = max_lba.to_be_bytes().to_vec();
        data.extend_from_slice(&self.block_size.to_be_bytes());
        CommandOutcome::ok(data, COMMAND_TIME)
    }

    fn capacity16(&self) -> CommandOutcome {
        if !self.capacity16 {
            return Self::invalid_opcode();
        }
        let mut data = vec![0u8; 32];
        data[0..8].copy_from_slice(&(self.total_blocks - 1).to_be_bytes());
        data[8..12].copy_from_slice(&self.block_size.to_be_bytes());
        data[13] = self.physical_exponent;
        CommandOutcome::ok(data, COMMAND_TIME)
    }

    fn execute(&self, cdb: &Cdb, direction: &DataDirection) -> CommandOutcome {
        let bytes = cdb.as_bytes();
        let opcode = cdb.opcode();
        let gated = matches!(
            opcode,
            scsi::READ_6 | scsi::READ_10 | scsi::READ_12 | scsi::READ_16 | scsi::SEEK_6 | scsi::SEEK_10
        );
        let syquest_long = match opcode {
            scsi::READ_6 => bytes[5] & 0x40 != 0,
            scsi::READ_10 => bytes[9] & 0x40 != 0,
            _ => false,
        };
        if syquest_long {
            return self.syquest(cdb, direction);
        }
        if gated && !self.opcodes.contains(&opcode) {
            return Self::invalid_opcode();
        }

        match opcode {
            scsi::READ_6 => {
                let count = match cdb.field(4, 1) {
                    0 => 256,
                    n => n,
                };
                self.read_logical(cdb.field(1, 3) & LBA21_MAX, count, direction)
            }
            scsi::READ_10 => self.read_logical(cdb.field(2, 4), cdb.field(7, 2), direction),
            scsi::READ_12 => self.read_logical(cdb.field(2, 4), cdb.field(6, 4), direction),
            scsi::READ_16 => self.read_logical(cdb.field(2, 8), cdb.field(10, 4), direction),
            scsi::SEEK_6 | scsi::SEEK_10 => {
                let lba = if opcode == scsi::SEEK_6 {
                    cdb.field(1, 3) & LBA21_MAX
                } else {
                    cdb.field(2, 4)
                };
                if lba < self.total_blocks {
                    CommandOutcome::ok(Vec::new(), COMMAND_TIME)
                } else {
                    Self::out_of_range()
                }
            }
            scsi::READ_CAPACITY_10 => self.capacity10(),
            scsi::SERVICE_ACTION_IN_16 => match bytes[1] & 0x1F {
                scsi::SA_READ_CAPACITY_16 => self.capacity16(),
                scsi::SA_READ_LONG_16 => {
                    self.read_long(cdb.field(2, 8), cdb.field(12, 2) as u32, &self.read_long16)
                }
                _ => Self::invalid_field(),
            },
            scsi::READ_LONG_10 => {
                let lba = cdb.field(2, 4);
                let requested = cdb.field(7, 2) as u32;
                if self.dvd_ecc_block && requested == 37856 {
                    return CommandOutcome::ok(block_pattern(lba, 37856), COMMAND_TIME);
                }
                self.read_long(lba, requested, &self.read_long10)
            }
            scsi::MEDIUM_SCAN => match (self.medium_scan, direction) {
                (Some(lba), DataDirection::Out(params)) if params.len() == 8 => {
                    CommandOutcome::failed(
                        fixed_sense(sense::KEY_EQUAL, 0x00, 0x00, Some(lba as u32), false),
                        COMMAND_TIME,
                    )
                }
                _ => Self::invalid_opcode(),
            },
            scsi::HLDTST_VENDOR | scsi::READ_BUFFER if self.raw_dvd => {
                let (lba, blocks) = if opcode == scsi::HLDTST_VENDOR {
                    (cdb.field(6, 4), cdb.field(10, 2))
                } else {
                    (cdb.field(2, 4), cdb.field(6, 3) / 2064)
                };
                self.read(lba, blocks, 2064)
            }
            _ => Self::invalid_opcode(),
        }
    }

    /// SyQuest long reads carry a block count; the byte count comes from
    /// the data phase, and a mismatch is reported as a residue.
    fn syquest(&self, cdb: &Cdb, direction: &DataDirection) -> CommandOutcome {
        let (lba, blocks) = if cdb.opcode() == scsi::READ_6 {
            (cdb.field(1, 3) & LBA21_MAX, cdb.field(4, 1).max(1))
        } else {
            (cdb.field(2, 4), cdb.field(7, 2))
        };
        let requested = match direction {
            DataDirection::In(bytes) => *bytes as u64,
            _ => 0,
        };

        if cdb.opcode() == scsi::READ_6
            && let Some(size) = self.syquest_long6_fixed
        {
            return if requested == size as u64 * blocks {
                self.read(lba, blocks, size)
            } else {
                Self::invalid_field()
            };
        }

        let Some(size) = self.syquest_long else {
            return Self::invalid_field();
        };
        if requested == size as u64 * blocks {
            return self.read(lba, blocks, size);
        }
        CommandOutcome::failed(
            fixed_sense(
                sense::KEY_ILLEGAL_REQUEST,
                sense::ASC_INVALID_FIELD_IN_CDB,
                0x00,
                Some(requested.wrapping_sub(size as u64) as u32),
                true,
            ),
            COMMAND_TIME,
        )
    }
}

impl CommandTransport for SimulatedScsiDisk {
    fn issue(
        &mut self,
        command: &DeviceCommand,
        direction: DataDirection,
        timeout: Duration,
    ) -> CommandOutcome {
        self.journal.push(command, &direction, timeout);
        match command {
            DeviceCommand::Scsi(cdb) => self.execute(cdb, &direction),
            _ => Self::invalid_opcode(),
        }
    }
}
