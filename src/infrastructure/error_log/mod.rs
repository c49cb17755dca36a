//! Error log sinks

mod memory_error_log;
mod tracing_error_log;

pub use memory_error_log::MemoryErrorLog;
pub use tracing_error_log::TracingErrorLog;
