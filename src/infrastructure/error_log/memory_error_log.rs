//! In-memory error log
//!
//! Keeps every record in a shared list. Clones share the list, so a caller
//! can hand one clone to the reader and inspect the other.

use crate::domain::repositories::{ErrorLog, ErrorLogError, ErrorRecord};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct MemoryErrorLog {
    records: Arc<Mutex<Vec<ErrorRecord>>>,
}

impl MemoryErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records so far.
    pub fn records(&self) -> Vec<ErrorRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    /// Serializes the records as a JSON array.
    pub fn to_json(&self) -> Result<String, ErrorLogError> {
        serde_json::to_string(&*self.records.lock())
            .map_err(|e| ErrorLogError::Unavailable(e.to_string()))
    }
}

impl ErrorLog for MemoryErrorLog {
    fn record(&self, record: &ErrorRecord) -> Result<(), ErrorLogError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}
