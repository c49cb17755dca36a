//! Error log that emits tracing events

use crate::domain::repositories::{ErrorLog, ErrorLogError, ErrorRecord};

/// Default sink: one `error` event per failed command.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorLog;

impl ErrorLog for TracingErrorLog {
    fn record(&self, record: &ErrorRecord) -> Result<(), ErrorLogError> {
        tracing::error!(
            target: "rawprobe::error_log",
            address = record.address,
            status_code = record.status_code,
            error_code = record.error_code,
            raw = ?record.raw,
            "command failed"
        );
        Ok(())
    }
}
