//! Infrastructure layer
//!
//! Default implementations of the collaborator traits the reader consumes.

pub mod error_log;
pub mod sense;

pub use error_log::{MemoryErrorLog, TracingErrorLog};
pub use sense::ScsiSenseClassifier;
