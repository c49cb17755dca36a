//! Transfer length tuning
//!
//! Finds the largest block count the device accepts in one request by
//! halving from an initial guess until a trial read succeeds.

use super::command_context::CommandContext;
use crate::domain::entities::{BlockAddress, Geometry, ReadCommand, TransferTuning};
use tracing::{debug, info, warn};

pub struct TransferLengthTuner {
    start_size: u32,
}

impl TransferLengthTuner {
    pub fn new(start_size: u32) -> Self {
        Self {
            start_size: start_size.max(1),
        }
    }

    /// Trial reads at block 0 with `command`, halving on every failure.
    ///
    /// The start size is clamped to what the command can encode. A failing
    /// single-block read leaves the device usable one block at a time.
    pub fn tune(
        &self,
        ctx: &mut CommandContext<'_>,
        command: ReadCommand,
        geometry: &Geometry,
    ) -> TransferTuning {
        let mut size = self.start_size.min(command.max_blocks());
        let mut probes = 0u32;

        loop {
            probes += 1;
            if Self::trial(ctx, command, geometry, size) {
                info!(blocks_per_request = size, probes, "transfer length tuned");
                return TransferTuning {
                    blocks_per_request: size,
                    probes,
                    degraded: false,
                    forced: false,
                };
            }
            debug!(size, "trial read failed");
            if size == 1 {
                warn!(probes, "single-block trial read failed, reading one block at a time");
                return TransferTuning {
                    blocks_per_request: 1,
                    probes,
                    degraded: true,
                    forced: false,
                };
            }
            size /= 2;
        }
    }

    fn trial(ctx: &mut CommandContext<'_>, command: ReadCommand, geometry: &Geometry, size: u32) -> bool {
        let address = if command.is_chs() {
            match geometry.chs.and_then(|chs| chs.to_chs(0)) {
                Some(chs) => BlockAddress::Chs(chs),
                None => return false,
            }
        } else {
            BlockAddress::Lba(0)
        };
        let Some(encoded) = command.encode(address, size) else {
            return false;
        };
        ctx.read(&encoded, geometry.byte_len(size)).usable()
    }
}
