//! Application layer
//!
//! The block reader façade and the values it hands to callers.

mod block_reader;
pub mod dto;

pub use block_reader::{BlockReader, ReaderStage};
