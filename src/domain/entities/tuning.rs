//! Transfer tuning entity

/// Default number of blocks the tuner starts from.
pub const DEFAULT_TRANSFER_BLOCKS: u32 = 64;
/// Blocks per request forced on optical media whose first block is unreadable.
pub const OPTICAL_TRANSFER_BLOCKS: u32 = 16;

/// Outcome of transfer length tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTuning {
    /// Default batch size for callers; never below 1
    pub blocks_per_request: u32,
    /// Trial reads issued to find it
    pub probes: u32,
    /// Even a single-block trial failed
    pub degraded: bool,
    /// Set without probing
    pub forced: bool,
}

impl TransferTuning {
    pub fn forced(blocks_per_request: u32) -> Self {
        Self {
            blocks_per_request: blocks_per_request.max(1),
            probes: 0,
            degraded: false,
            forced: true,
        }
    }
}
