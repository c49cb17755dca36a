//! Domain entities
//!
//! The values the probing phase produces and the reader keeps for its
//! whole lifetime.

mod capabilities;
mod device;
mod geometry;
mod raw_read;
mod tuning;

pub use capabilities::{CommandCapabilities, ReadCommand, ReadSupport, SeekCommand, SeekSupport};
pub use device::{AddressingMode, DeviceFamily, DeviceIdentity};
pub use geometry::{BlockAddress, Chs, ChsGeometry, Geometry};
pub use raw_read::{
    DVD_ECC_BLOCK_SIZE, RAW_DVD_SECTOR_SIZE, RawReadCommand, RawReadFamily, RawReadProfile,
};
pub use tuning::{DEFAULT_TRANSFER_BLOCKS, OPTICAL_TRANSFER_BLOCKS, TransferTuning};
