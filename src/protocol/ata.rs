//! ATA task files, status decoding and IDENTIFY DEVICE parsing.
//!
//! Only the commands the reader issues are encoded here: the READ SECTORS and
//! READ DMA families in their CHS, 28-bit and 48-bit forms, and SEEK.

/// READ SECTORS (with retries)
pub const READ_SECTORS_RETRY: u8 = 0x20;
/// READ SECTORS without retries (obsolete since ATA-5, still honoured by old drives)
pub const READ_SECTORS: u8 = 0x21;
/// READ SECTORS EXT
pub const READ_SECTORS_EXT: u8 = 0x24;
/// READ DMA EXT
pub const READ_DMA_EXT: u8 = 0x25;
/// SEEK
pub const SEEK: u8 = 0x70;
/// READ DMA (with retries)
pub const READ_DMA_RETRY: u8 = 0xC8;
/// READ DMA without retries
pub const READ_DMA: u8 = 0xC9;

/// Highest address reachable with a 28-bit task file.
pub const LBA28_MAX: u64 = 0x0FFF_FFFF;
/// Highest address reachable with a 48-bit task file.
pub const LBA48_MAX: u64 = 0xFFFF_FFFF_FFFF;

const DEVICE_OBSOLETE_BITS: u8 = 0xA0;
const DEVICE_LBA: u8 = 0x40;

/// A 28-bit (CHS or LBA28) register set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AtaTaskFile {
    pub features: u8,
    pub sector_count: u8,
    pub lba_low: u8,
    pub lba_mid: u8,
    pub lba_high: u8,
    pub device_head: u8,
    pub command: u8,
}

impl AtaTaskFile {
    /// Task file addressing a cylinder/head/sector triple.
    ///
    /// `sector_count` of 0 means 256 sectors, as on the wire.
    pub fn chs(command: u8, cylinder: u16, head: u8, sector: u8, sector_count: u8) -> Self {
        Self {
            features: 0,
            sector_count,
            lba_low: sector,
            lba_mid: (cylinder & 0xFF) as u8,
            lba_high: (cylinder >> 8) as u8,
            device_head: DEVICE_OBSOLETE_BITS | (head & 0x0F),
            command,
        }
    }

    /// Task file addressing a 28-bit LBA. Bits above 28 are dropped.
    pub fn lba28(command: u8, lba: u32, sector_count: u8) -> Self {
        Self {
            features: 0,
            sector_count,
            lba_low: (lba & 0xFF) as u8,
            lba_mid: ((lba >> 8) & 0xFF) as u8,
            lba_high: ((lba >> 16) & 0xFF) as u8,
            device_head: DEVICE_OBSOLETE_BITS | DEVICE_LBA | ((lba >> 24) & 0x0F) as u8,
            command,
        }
    }

    pub fn is_lba(&self) -> bool {
        self.device_head & DEVICE_LBA != 0
    }

    /// The LBA encoded in an LBA-mode task file.
    pub fn lba(&self) -> u32 {
        (self.lba_low as u32)
            | (self.lba_mid as u32) << 8
            | (self.lba_high as u32) << 16
            | ((self.device_head & 0x0F) as u32) << 24
    }

    /// The (cylinder, head, sector) triple encoded in a CHS task file.
    pub fn chs_address(&self) -> (u16, u8, u8) {
        let cylinder = (self.lba_mid as u16) | (self.lba_high as u16) << 8;
        (cylinder, self.device_head & 0x0F, self.lba_low)
    }

    /// Number of sectors requested, with the 0 → 256 convention applied.
    pub fn sectors(&self) -> u32 {
        if self.sector_count == 0 {
            256
        } else {
            self.sector_count as u32
        }
    }
}

/// A 48-bit register set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AtaTaskFileExt {
    pub features: u16,
    /// 0 means 65536 sectors.
    pub sector_count: u16,
    pub lba: u64,
    pub device: u8,
    pub command: u8,
}

impl AtaTaskFileExt {
    pub fn lba48(command: u8, lba: u64, sector_count: u16) -> Self {
        Self {
            features: 0,
            sector_count,
            lba: lba & LBA48_MAX,
            device: DEVICE_LBA,
            command,
        }
    }

    pub fn sectors(&self) -> u32 {
        if self.sector_count == 0 {
            65536
        } else {
            self.sector_count as u32
        }
    }
}

/// Decoded ATA status and error registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AtaStatus {
    pub status: u8,
    pub error: u8,
}

impl AtaStatus {
    pub const BSY: u8 = 0x80;
    pub const DRDY: u8 = 0x40;
    pub const DF: u8 = 0x20;
    pub const DSC: u8 = 0x10;
    pub const DRQ: u8 = 0x08;
    pub const CORR: u8 = 0x04;
    pub const ERR: u8 = 0x01;

    /// Error register: command aborted
    pub const ABRT: u8 = 0x04;
    /// Error register: ID not found (address out of range)
    pub const IDNF: u8 = 0x10;
    /// Error register: uncorrectable data
    pub const UNC: u8 = 0x40;

    /// Decodes `[status, error]` as returned by a transport. Missing bytes read as 0.
    pub fn from_bytes(raw: &[u8]) -> Self {
        Self {
            status: raw.first().copied().unwrap_or(0),
            error: raw.get(1).copied().unwrap_or(0),
        }
    }

    pub fn to_bytes(self) -> Vec<u8> {
        vec![self.status, self.error]
    }

    pub fn has_error(&self) -> bool {
        self.status & (Self::ERR | Self::DF) != 0
    }

    /// The device corrected the data itself.
    pub fn is_corrected(&self) -> bool {
        self.status & Self::CORR != 0
    }
}

/// Fields of the 256-word IDENTIFY DEVICE block the reader depends on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AtaIdentify {
    pub model: String,
    pub serial: String,
    pub firmware: String,
    pub default_cylinders: u16,
    pub default_heads: u16,
    pub default_sectors_per_track: u16,
    pub current_cylinders: u16,
    pub current_heads: u16,
    pub current_sectors_per_track: u16,
    /// Word 49 bit 9
    pub lba_supported: bool,
    /// Word 49 bit 8
    pub dma_supported: bool,
    /// Words 60-61
    pub lba28_sectors: u32,
    /// Word 83 bit 10
    pub lba48_supported: bool,
    /// Words 100-103
    pub lba48_sectors: u64,
    pub logical_sector_size: u32,
    pub physical_sector_size: u32,
}

impl AtaIdentify {
    /// Parses IDENTIFY DEVICE words.
    pub fn from_words(words: &[u16; 256]) -> Self {
        let lba48_sectors = (words[100] as u64)
            | (words[101] as u64) << 16
            | (words[102] as u64) << 32
            | (words[103] as u64) << 48;

        let (logical_sector_size, physical_sector_size) = sector_sizes(words);

        Self {
            model: parse_string(&words[27..47]),
            serial: parse_string(&words[10..20]),
            firmware: parse_string(&words[23..27]),
            default_cylinders: words[1],
            default_heads: words[3],
            default_sectors_per_track: words[6],
            current_cylinders: words[54],
            current_heads: words[55],
            current_sectors_per_track: words[56],
            lba_supported: words[49] & (1 << 9) != 0,
            dma_supported: words[49] & (1 << 8) != 0,
            lba28_sectors: (words[60] as u32) | (words[61] as u32) << 16,
            lba48_supported: words[83] & (1 << 10) != 0,
            lba48_sectors,
            logical_sector_size,
            physical_sector_size,
        }
    }

    /// Parses the 512-byte little-endian IDENTIFY buffer returned by a transport.
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        if raw.len() < 512 {
            return None;
        }
        let mut words = [0u16; 256];
        for (i, word) in words.iter_mut().enumerate() {
            *word = u16::from_le_bytes([raw[i * 2], raw[i * 2 + 1]]);
        }
        Some(Self::from_words(&words))
    }
}

// Word 106 is only meaningful with bit 14 set and bit 15 clear.
fn sector_sizes(words: &[u16; 256]) -> (u32, u32) {
    let info = words[106];
    if info & 0xC000 != 0x4000 {
        return (512, 512);
    }

    let logical_words = (words[117] as u32) | (words[118] as u32) << 16;
    let logical = if info & 0x1000 != 0 && logical_words > 255 {
        logical_words * 2
    } else {
        512
    };

    let physical = if info & 0x2000 != 0 {
        logical << (info & 0x0F)
    } else {
        logical
    };

    (logical, physical)
}

// ATA strings are stored as big-endian byte pairs, space padded.
fn parse_string(words: &[u16]) -> String {
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for &word in words {
        bytes.push((word >> 8) as u8);
        bytes.push((word & 0xFF) as u8);
    }
    String::from_utf8_lossy(&bytes)
        .trim_matches(|c: char| c == ' ' || c == '\0')
        .to_string()
}
