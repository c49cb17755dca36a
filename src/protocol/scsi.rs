//! SCSI command descriptor blocks and response parsing.
//!
//! Multi-byte CDB fields are big-endian. Vendor commands are best-effort
//! encodings of what the respective drives are known to accept.

pub const READ_6: u8 = 0x08;
pub const SEEK_6: u8 = 0x0B;
pub const INQUIRY: u8 = 0x12;
pub const READ_CAPACITY_10: u8 = 0x25;
pub const READ_10: u8 = 0x28;
pub const SEEK_10: u8 = 0x2B;
pub const MEDIUM_SCAN: u8 = 0x38;
pub const READ_BUFFER: u8 = 0x3C;
pub const READ_LONG_10: u8 = 0x3E;
pub const READ_16: u8 = 0x88;
pub const SERVICE_ACTION_IN_16: u8 = 0x9E;
pub const READ_12: u8 = 0xA8;
/// HL-DT-ST vendor command, carries the "HIT" signature in bytes 1-3.
pub const HLDTST_VENDOR: u8 = 0xE7;

pub const SA_READ_CAPACITY_16: u8 = 0x10;
pub const SA_READ_LONG_16: u8 = 0x11;

/// Highest LBA a 6-byte CDB can carry.
pub const LBA21_MAX: u64 = 0x1F_FFFF;
/// Highest LBA a 10- or 12-byte CDB can carry.
pub const LBA32_MAX: u64 = 0xFFFF_FFFF;

/// Vendor bit SyQuest drives use in the control byte to request long reads.
const SYQUEST_LONG: u8 = 0x40;

/// A command descriptor block of up to 16 bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Cdb {
    bytes: [u8; 16],
    len: u8,
}

impl Cdb {
    fn zeroed(len: u8) -> Self {
        Self {
            bytes: [0; 16],
            len,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() || bytes.len() > 16 {
            return None;
        }
        let mut cdb = Self::zeroed(bytes.len() as u8);
        cdb.bytes[..bytes.len()].copy_from_slice(bytes);
        Some(cdb)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn opcode(&self) -> u8 {
        self.bytes[0]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads a big-endian field of `width` bytes starting at `offset`.
    pub fn field(&self, offset: usize, width: usize) -> u64 {
        self.bytes[offset..offset + width]
            .iter()
            .fold(0u64, |acc, &b| acc << 8 | b as u64)
    }

    fn put(&mut self, offset: usize, width: usize, value: u64) {
        for i in 0..width {
            self.bytes[offset + i] = (value >> (8 * (width - 1 - i))) as u8;
        }
    }
}

impl std::fmt::Debug for Cdb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cdb(")?;
        for (i, b) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{b:02X}")?;
        }
        write!(f, ")")
    }
}

/// READ(6). A transfer length of 0 means 256 blocks.
pub fn read6(lba: u32, blocks: u8) -> Cdb {
    let mut cdb = Cdb::zeroed(6);
    cdb.bytes[0] = READ_6;
    cdb.put(1, 3, (lba as u64) & LBA21_MAX);
    cdb.bytes[4] = blocks;
    cdb
}

pub fn read10(lba: u32, blocks: u16) -> Cdb {
    let mut cdb = Cdb::zeroed(10);
    cdb.bytes[0] = READ_10;
    cdb.put(2, 4, lba as u64);
    cdb.put(7, 2, blocks as u64);
    cdb
}

pub fn read12(lba: u32, blocks: u32) -> Cdb {
    let mut cdb = Cdb::zeroed(12);
    cdb.bytes[0] = READ_12;
    cdb.put(2, 4, lba as u64);
    cdb.put(6, 4, blocks as u64);
    cdb
}

pub fn read16(lba: u64, blocks: u32) -> Cdb {
    let mut cdb = Cdb::zeroed(16);
    cdb.bytes[0] = READ_16;
    cdb.put(2, 8, lba);
    cdb.put(10, 4, blocks as u64);
    cdb
}

pub fn seek6(lba: u32) -> Cdb {
    let mut cdb = Cdb::zeroed(6);
    cdb.bytes[0] = SEEK_6;
    cdb.put(1, 3, (lba as u64) & LBA21_MAX);
    cdb
}

pub fn seek10(lba: u32) -> Cdb {
    let mut cdb = Cdb::zeroed(10);
    cdb.bytes[0] = SEEK_10;
    cdb.put(2, 4, lba as u64);
    cdb
}

pub fn inquiry(allocation_length: u8) -> Cdb {
    let mut cdb = Cdb::zeroed(6);
    cdb.bytes[0] = INQUIRY;
    cdb.bytes[4] = allocation_length;
    cdb
}

pub fn read_capacity10() -> Cdb {
    let mut cdb = Cdb::zeroed(10);
    cdb.bytes[0] = READ_CAPACITY_10;
    cdb
}

/// READ CAPACITY(16) through SERVICE ACTION IN(16).
pub fn read_capacity16(allocation_length: u32) -> Cdb {
    let mut cdb = Cdb::zeroed(16);
    cdb.bytes[0] = SERVICE_ACTION_IN_16;
    cdb.bytes[1] = SA_READ_CAPACITY_16;
    cdb.put(10, 4, allocation_length as u64);
    cdb
}

/// MEDIUM SCAN for the first written block at or after `lba`.
///
/// The command carries an 8-byte parameter list (see [`medium_scan_parameters`]).
pub fn medium_scan_written(lba: u32) -> Cdb {
    let mut cdb = Cdb::zeroed(10);
    cdb.bytes[0] = MEDIUM_SCAN;
    // WBS: search for written blocks
    cdb.bytes[1] = 0x10;
    cdb.put(2, 4, lba as u64);
    cdb.bytes[8] = 8;
    cdb
}

/// Parameter list for MEDIUM SCAN: blocks requested, then blocks to scan.
pub fn medium_scan_parameters(requested: u32, scan_length: u32) -> Vec<u8> {
    let mut params = Vec::with_capacity(8);
    params.extend_from_slice(&requested.to_be_bytes());
    params.extend_from_slice(&scan_length.to_be_bytes());
    params
}

/// READ LONG(10). The transfer length is in bytes.
pub fn read_long10(lba: u32, byte_length: u16) -> Cdb {
    let mut cdb = Cdb::zeroed(10);
    cdb.bytes[0] = READ_LONG_10;
    cdb.put(2, 4, lba as u64);
    cdb.put(7, 2, byte_length as u64);
    cdb
}

/// READ LONG(16) through SERVICE ACTION IN(16). The transfer length is in bytes.
pub fn read_long16(lba: u64, byte_length: u16) -> Cdb {
    let mut cdb = Cdb::zeroed(16);
    cdb.bytes[0] = SERVICE_ACTION_IN_16;
    cdb.bytes[1] = SA_READ_LONG_16;
    cdb.put(2, 8, lba);
    cdb.put(12, 2, byte_length as u64);
    cdb
}

/// SyQuest long read: a READ(10) with the vendor long bit in the control byte.
pub fn syquest_read_long10(lba: u32, blocks: u16) -> Cdb {
    let mut cdb = read10(lba, blocks);
    cdb.bytes[9] = SYQUEST_LONG;
    cdb
}

/// SyQuest long read: a READ(6) with the vendor long bit in the control byte.
pub fn syquest_read_long6(lba: u32, blocks: u8) -> Cdb {
    let mut cdb = read6(lba, blocks);
    cdb.bytes[5] = SYQUEST_LONG;
    cdb
}

/// HL-DT-ST raw DVD sector read (2064 bytes per sector).
pub fn hldtst_read_raw_dvd(lba: u32, blocks: u16) -> Cdb {
    let mut cdb = Cdb::zeroed(12);
    cdb.bytes[0] = HLDTST_VENDOR;
    cdb.bytes[1] = b'H';
    cdb.bytes[2] = b'I';
    cdb.bytes[3] = b'T';
    cdb.bytes[4] = 0x01;
    cdb.put(6, 4, lba as u64);
    cdb.put(10, 2, blocks as u64);
    cdb
}

/// Plextor raw DVD sector read through READ BUFFER mode 2.
pub fn plextor_read_raw_dvd(lba: u32, byte_length: u32) -> Cdb {
    let mut cdb = Cdb::zeroed(10);
    cdb.bytes[0] = READ_BUFFER;
    cdb.bytes[1] = 0x02;
    cdb.put(2, 4, lba as u64);
    cdb.put(6, 3, (byte_length & 0x00FF_FFFF) as u64);
    cdb
}

/// SCSI peripheral device type (INQUIRY byte 0, bits 0-4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeripheralType {
    #[default]
    DirectAccess,
    SequentialAccess,
    WriteOnce,
    MultiMedia,
    OpticalMemory,
    SimplifiedDirectAccess,
    Other(u8),
}

impl PeripheralType {
    pub fn from_code(code: u8) -> Self {
        match code & 0x1F {
            0x00 => Self::DirectAccess,
            0x01 => Self::SequentialAccess,
            0x04 => Self::WriteOnce,
            0x05 => Self::MultiMedia,
            0x07 => Self::OpticalMemory,
            0x0E => Self::SimplifiedDirectAccess,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::DirectAccess => 0x00,
            Self::SequentialAccess => 0x01,
            Self::WriteOnce => 0x04,
            Self::MultiMedia => 0x05,
            Self::OpticalMemory => 0x07,
            Self::SimplifiedDirectAccess => 0x0E,
            Self::Other(code) => *code,
        }
    }

    /// Optical media of any kind: magneto-optical, WORM, CD/DVD.
    pub fn is_optical(&self) -> bool {
        matches!(self, Self::WriteOnce | Self::MultiMedia | Self::OpticalMemory)
    }

    /// CD/DVD/BD drives speaking MMC.
    pub fn is_multimedia(&self) -> bool {
        matches!(self, Self::MultiMedia)
    }
}

/// Standard INQUIRY data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InquiryData {
    pub peripheral_type: PeripheralType,
    pub removable: bool,
    pub vendor: String,
    pub product: String,
    pub revision: String,
}

impl InquiryData {
    /// Parses standard INQUIRY data; needs at least 36 bytes.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < 36 {
            return None;
        }
        Some(Self {
            peripheral_type: PeripheralType::from_code(raw[0]),
            removable: raw[1] & 0x80 != 0,
            vendor: ascii_field(&raw[8..16]),
            product: ascii_field(&raw[16..32]),
            revision: ascii_field(&raw[32..36]),
        })
    }
}

fn ascii_field(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_matches(|c: char| c == ' ' || c == '\0')
        .to_string()
}

/// Parsed READ CAPACITY response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub max_lba: u64,
    pub block_length: u32,
    /// log2 of logical blocks per physical block (READ CAPACITY(16) only)
    pub physical_exponent: u8,
}

impl Capacity {
    pub fn parse10(raw: &[u8]) -> Option<Self> {
        if raw.len() < 8 {
            return None;
        }
        Some(Self {
            max_lba: u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as u64,
            block_length: u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]),
            physical_exponent: 0,
        })
    }

    pub fn parse16(raw: &[u8]) -> Option<Self> {
        if raw.len() < 14 {
            return None;
        }
        let mut lba = [0u8; 8];
        lba.copy_from_slice(&raw[0..8]);
        Some(Self {
            max_lba: u64::from_be_bytes(lba),
            block_length: u32::from_be_bytes([raw[8], raw[9], raw[10], raw[11]]),
            physical_exponent: raw[13] & 0x0F,
        })
    }

    /// READ CAPACITY(10) saturates at all-ones when the device is too large.
    pub fn is_saturated(&self) -> bool {
        self.max_lba == LBA32_MAX
    }

    pub fn total_blocks(&self) -> u64 {
        self.max_lba.saturating_add(1)
    }

    pub fn physical_block_size(&self) -> u32 {
        self.block_length.checked_shl(self.physical_exponent as u32).unwrap_or(self.block_length)
    }
}
