//! Sense classifier for standard SCSI sense data

use crate::domain::repositories::{SenseClass, SenseClassifier};
use crate::protocol::sense::{
    KEY_BLANK_CHECK, KEY_EQUAL, KEY_ILLEGAL_REQUEST, KEY_NO_SENSE, KEY_RECOVERED_ERROR, SenseData,
};

/// Classifies fixed and descriptor format sense data by sense key.
///
/// Buffers that do not decode are treated as fatal with all codes zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScsiSenseClassifier;

impl ScsiSenseClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl SenseClassifier for ScsiSenseClassifier {
    fn classify(&self, sense: &[u8]) -> SenseClass {
        let Some(data) = SenseData::parse(sense) else {
            return SenseClass::Fatal {
                sense_key: 0,
                asc: 0,
                ascq: 0,
            };
        };

        match data.sense_key {
            KEY_NO_SENSE => SenseClass::Ok,
            KEY_RECOVERED_ERROR => SenseClass::RecoveredError,
            KEY_BLANK_CHECK => SenseClass::BlankCheck,
            KEY_ILLEGAL_REQUEST => SenseClass::IllegalRequest {
                asc: data.asc,
                ascq: data.ascq,
                information: data.information,
                incorrect_length: data.ili,
            },
            KEY_EQUAL => SenseClass::Equal {
                information: data.information,
            },
            sense_key => SenseClass::Fatal {
                sense_key,
                asc: data.asc,
                ascq: data.ascq,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::sense::{KEY_MEDIUM_ERROR, fixed_sense};

    #[test]
    fn test_illegal_request_keeps_information() {
        let raw = fixed_sense(KEY_ILLEGAL_REQUEST, 0x24, 0x00, Some(63155), true);
        assert_eq!(
            ScsiSenseClassifier.classify(&raw),
            SenseClass::IllegalRequest {
                asc: 0x24,
                ascq: 0x00,
                information: Some(63155),
                incorrect_length: true,
            }
        );
    }

    #[test]
    fn test_recovered_and_blank() {
        let recovered = fixed_sense(KEY_RECOVERED_ERROR, 0x17, 0x01, None, false);
        let blank = fixed_sense(KEY_BLANK_CHECK, 0x00, 0x00, None, false);
        assert_eq!(ScsiSenseClassifier.classify(&recovered), SenseClass::RecoveredError);
        assert_eq!(ScsiSenseClassifier.classify(&blank), SenseClass::BlankCheck);
    }

    #[test]
    fn test_medium_error_is_fatal() {
        let raw = fixed_sense(KEY_MEDIUM_ERROR, 0x11, 0x00, None, false);
        assert_eq!(
            ScsiSenseClassifier.classify(&raw),
            SenseClass::Fatal {
                sense_key: KEY_MEDIUM_ERROR,
                asc: 0x11,
                ascq: 0x00
            }
        );
    }

    #[test]
    fn test_garbage_is_fatal() {
        assert_eq!(
            ScsiSenseClassifier.classify(&[0x01, 0x02]),
            SenseClass::Fatal {
                sense_key: 0,
                asc: 0,
                ascq: 0
            }
        );
    }
}
