//! Data Transfer Objects

mod read_outcome;
mod reader_options;

pub use read_outcome::{ReadOutcome, SeekOutcome};
pub use reader_options::ReaderOptions;
