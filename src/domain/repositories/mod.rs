//! Repository traits (interfaces)
//!
//! The collaborators the reader consumes but does not own: the command
//! transport, sense classification and the error log.

mod command_transport;
mod error_log;
mod sense_classifier;

pub use command_transport::{CommandOutcome, CommandTransport, DataDirection, DeviceCommand};
pub use error_log::{ErrorLog, ErrorLogError, ErrorRecord};
pub use sense_classifier::{SenseClass, SenseClassifier};
