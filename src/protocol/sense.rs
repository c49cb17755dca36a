//! SCSI sense data decoding (fixed and descriptor formats).

pub const KEY_NO_SENSE: u8 = 0x0;
pub const KEY_RECOVERED_ERROR: u8 = 0x1;
pub const KEY_NOT_READY: u8 = 0x2;
pub const KEY_MEDIUM_ERROR: u8 = 0x3;
pub const KEY_HARDWARE_ERROR: u8 = 0x4;
pub const KEY_ILLEGAL_REQUEST: u8 = 0x5;
pub const KEY_UNIT_ATTENTION: u8 = 0x6;
pub const KEY_BLANK_CHECK: u8 = 0x8;
pub const KEY_EQUAL: u8 = 0xC;

/// ASC for "invalid field in CDB"
pub const ASC_INVALID_FIELD_IN_CDB: u8 = 0x24;
/// ASC for "invalid command operation code"
pub const ASC_INVALID_OPCODE: u8 = 0x20;
/// ASC for "logical block address out of range"
pub const ASC_LBA_OUT_OF_RANGE: u8 = 0x21;

const DESCRIPTOR_INFORMATION: u8 = 0x00;
const DESCRIPTOR_BLOCK_COMMANDS: u8 = 0x05;

/// The parts of a sense buffer the reader acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SenseData {
    pub response_code: u8,
    pub sense_key: u8,
    pub asc: u8,
    pub ascq: u8,
    /// INFORMATION field, present only when the device marked it valid.
    pub information: Option<u64>,
    /// Incorrect length indicator
    pub ili: bool,
}

impl SenseData {
    /// Decodes fixed (70h/71h) or descriptor (72h/73h) format sense data.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let response_code = raw.first()? & 0x7F;
        match response_code {
            0x70 | 0x71 => Self::parse_fixed(raw, response_code),
            0x72 | 0x73 => Self::parse_descriptor(raw, response_code),
            _ => None,
        }
    }

    fn parse_fixed(raw: &[u8], response_code: u8) -> Option<Self> {
        if raw.len() < 3 {
            return None;
        }
        let valid = raw[0] & 0x80 != 0;
        let information = if valid && raw.len() >= 7 {
            Some(u32::from_be_bytes([raw[3], raw[4], raw[5], raw[6]]) as u64)
        } else {
            None
        };
        Some(Self {
            response_code,
            sense_key: raw[2] & 0x0F,
            asc: raw.get(12).copied().unwrap_or(0),
            ascq: raw.get(13).copied().unwrap_or(0),
            information,
            ili: raw[2] & 0x20 != 0,
        })
    }

    fn parse_descriptor(raw: &[u8], response_code: u8) -> Option<Self> {
        if raw.len() < 4 {
            return None;
        }
        let mut sense = Self {
            response_code,
            sense_key: raw[1] & 0x0F,
            asc: raw[2],
            ascq: raw[3],
            information: None,
            ili: false,
        };

        let additional = raw.get(7).copied().unwrap_or(0) as usize;
        let end = (8 + additional).min(raw.len());
        let mut offset = 8;
        while offset + 2 <= end {
            let kind = raw[offset];
            let len = raw[offset + 1] as usize;
            let body = &raw[offset..(offset + 2 + len).min(end)];
            match kind {
                DESCRIPTOR_INFORMATION if body.len() >= 12 && body[2] & 0x80 != 0 => {
                    let mut info = [0u8; 8];
                    info.copy_from_slice(&body[4..12]);
                    sense.information = Some(u64::from_be_bytes(info));
                }
                DESCRIPTOR_BLOCK_COMMANDS if body.len() >= 4 => {
                    sense.ili = body[3] & 0x20 != 0;
                }
                _ => {}
            }
            offset += 2 + len;
        }
        Some(sense)
    }
}

/// Builds fixed-format sense data. Used by simulated devices and tests.
pub fn fixed_sense(sense_key: u8, asc: u8, ascq: u8, information: Option<u32>, ili: bool) -> Vec<u8> {
    let mut raw = vec![0u8; 18];
    raw[0] = 0x70;
    if let Some(info) = information {
        raw[0] |= 0x80;
        raw[3..7].copy_from_slice(&info.to_be_bytes());
    }
    raw[2] = sense_key & 0x0F;
    if ili {
        raw[2] |= 0x20;
    }
    raw[7] = 10;
    raw[12] = asc;
    raw[13] = ascq;
    raw
}
