//! Sense classifier trait
//!
//! Reduces raw sense bytes to the handful of outcomes the reader acts on.

/// Classification of SCSI sense data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenseClass {
    /// Nothing wrong
    Ok,
    /// The device corrected the error; data is usable
    RecoveredError,
    /// The addressed block has never been written
    BlankCheck,
    /// The command was rejected.
    ///
    /// `information` is only present when the device marked it valid.
    IllegalRequest {
        asc: u8,
        ascq: u8,
        information: Option<u64>,
        incorrect_length: bool,
    },
    /// A search command matched; `information` holds the matching address
    Equal { information: Option<u64> },
    /// Anything else
    Fatal { sense_key: u8, asc: u8, ascq: u8 },
}

impl SenseClass {
    /// Status code and error code pair mirrored to the error log.
    pub fn codes(&self) -> (u32, u32) {
        match *self {
            SenseClass::Ok => (0, 0),
            SenseClass::RecoveredError => (0x1, 0),
            SenseClass::BlankCheck => (0x8, 0),
            SenseClass::IllegalRequest { asc, ascq, .. } => {
                (0x5, (asc as u32) << 8 | ascq as u32)
            }
            SenseClass::Equal { .. } => (0xC, 0),
            SenseClass::Fatal {
                sense_key,
                asc,
                ascq,
            } => (sense_key as u32, (asc as u32) << 8 | ascq as u32),
        }
    }
}

/// Classifies sense data returned by a failed SCSI command.
pub trait SenseClassifier: Send + Sync {
    fn classify(&self, sense: &[u8]) -> SenseClass;
}
