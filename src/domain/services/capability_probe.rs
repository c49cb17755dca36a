//! Command capability probing
//!
//! Device self-description is not trusted: every read variant of the family
//! is issued once at a trial address and only the ones that return data are
//! recorded. When nothing works at the trial address the probe moves to a
//! known-written block (MEDIUM SCAN, optical media only) or a random one,
//! since blank blocks near the start of a medium are common.

use super::command_context::CommandContext;
use crate::domain::entities::{
    AddressingMode, BlockAddress, CommandCapabilities, DeviceFamily, DeviceIdentity, Geometry,
    ReadCommand, ReadSupport, SeekCommand, SeekSupport,
};
use crate::domain::repositories::{DataDirection, DeviceCommand, SenseClass};
use crate::error::{ReaderError, Result};
use crate::protocol::ata::LBA28_MAX;
use crate::protocol::scsi::{self, LBA32_MAX};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

/// Default bound on trial addresses.
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 10;

/// Block sizes tried on optical media that did not report one.
const OPTICAL_BLOCK_SIZES: [u32; 6] = [2048, 2352, 2336, 512, 1024, 4096];

/// What probing established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub capabilities: CommandCapabilities,
    /// Address at which the working commands were found
    pub trial_lba: u64,
    /// Trial addresses used, including the successful one
    pub attempts: u32,
    /// Whether any read variant worked at block 0
    pub block_zero_readable: bool,
    /// Block size found by trial reads when the device did not report one
    pub learned_block_size: Option<u32>,
}

pub struct CapabilityProbe {
    max_attempts: u32,
    rng: StdRng,
}

impl CapabilityProbe {
    /// `seed` makes the random trial addresses reproducible.
    pub fn new(max_attempts: u32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            max_attempts: max_attempts.max(1),
            rng,
        }
    }

    pub fn probe(
        &mut self,
        ctx: &mut CommandContext<'_>,
        family: DeviceFamily,
        geometry: &Geometry,
        identity: &DeviceIdentity,
    ) -> Result<ProbeReport> {
        let candidates = ReadCommand::for_family(family);
        if candidates.is_empty() {
            return Err(ReaderError::UnsupportedDevice);
        }
        let block_sizes = Self::block_sizes(geometry);

        let mut lba = 0u64;
        let mut attempts = 0u32;
        let mut block_zero_readable = false;
        let mut found = None;

        while attempts < self.max_attempts {
            attempts += 1;
            if let Some((reads, block_size)) =
                Self::try_reads(ctx, candidates, geometry, lba, &block_sizes)
            {
                block_zero_readable |= lba == 0;
                found = Some((reads, block_size));
                break;
            }
            debug!(lba, attempt = attempts, "no read command succeeded");

            let scanned = if attempts == 1 && family == DeviceFamily::Scsi && identity.is_optical()
            {
                Self::medium_scan(ctx, geometry)
            } else {
                None
            };
            lba = match scanned {
                Some(written) => written,
                None => self.random_lba(geometry),
            };
        }

        let Some((reads, block_size)) = found else {
            warn!(attempts, "device did not honour any read command");
            return Err(ReaderError::NoWorkingReadCommand { attempts });
        };

        let learned_block_size =
            (!geometry.capacity_known && block_size != geometry.logical_block_size)
                .then_some(block_size);
        let mut effective = geometry.clone();
        effective.logical_block_size = block_size;
        effective.physical_block_size = effective.physical_block_size.max(block_size);

        let seeks = Self::try_seeks(ctx, family, &effective, lba);
        let capabilities = CommandCapabilities::select(family, &effective, reads, seeks);

        let Some(preferred) = capabilities.preferred_read() else {
            let required = Self::required_addressing(family, &effective);
            warn!(required, ?reads, "no working read command covers the device");
            return Err(ReaderError::AddressingUnavailable { required });
        };

        info!(
            ?preferred,
            seek = ?capabilities.preferred_seek(),
            trial_lba = lba,
            attempts,
            "read command selected"
        );

        Ok(ProbeReport {
            capabilities,
            trial_lba: lba,
            attempts,
            block_zero_readable,
            learned_block_size,
        })
    }

    fn block_sizes(geometry: &Geometry) -> Vec<u32> {
        let mut sizes = vec![geometry.logical_block_size];
        if !geometry.capacity_known {
            sizes.extend(
                OPTICAL_BLOCK_SIZES
                    .iter()
                    .copied()
                    .filter(|&size| size != geometry.logical_block_size),
            );
        }
        sizes
    }

    /// Issues every candidate once at `lba`. Returns the working set and the
    /// block size it worked with, or `None` when nothing worked.
    fn try_reads(
        ctx: &mut CommandContext<'_>,
        candidates: &[ReadCommand],
        geometry: &Geometry,
        lba: u64,
        block_sizes: &[u32],
    ) -> Option<(ReadSupport, u32)> {
        for &block_size in block_sizes {
            let mut reads = ReadSupport::empty();
            for &command in candidates {
                if Self::try_read(ctx, command, geometry, lba, block_size) {
                    reads |= command.flag();
                }
            }
            if !reads.is_empty() {
                return Some((reads, block_size));
            }
        }
        None
    }

    fn try_read(
        ctx: &mut CommandContext<'_>,
        command: ReadCommand,
        geometry: &Geometry,
        lba: u64,
        block_size: u32,
    ) -> bool {
        let Some(address) = Self::address_for(command.is_chs(), geometry, lba) else {
            return false;
        };
        let Some(encoded) = command.encode(address, 1) else {
            return false;
        };
        let issued = ctx.read(&encoded, block_size as usize);
        debug!(?command, lba, block_size, ok = issued.usable(), "probed read");
        issued.usable()
    }

    fn try_seeks(
        ctx: &mut CommandContext<'_>,
        family: DeviceFamily,
        geometry: &Geometry,
        lba: u64,
    ) -> SeekSupport {
        let mut seeks = SeekSupport::empty();
        for &command in SeekCommand::for_family(family) {
            let Some(address) = Self::address_for(command.is_chs(), geometry, lba) else {
                continue;
            };
            let Some(encoded) = command.encode(address) else {
                continue;
            };
            let issued = ctx.issue(&encoded, DataDirection::None);
            debug!(?command, lba, ok = issued.usable(), "probed seek");
            if issued.usable() {
                seeks |= command.flag();
            }
        }
        seeks
    }

    fn address_for(chs: bool, geometry: &Geometry, lba: u64) -> Option<BlockAddress> {
        if chs {
            geometry.chs?.to_chs(lba).map(BlockAddress::Chs)
        } else {
            Some(BlockAddress::Lba(lba))
        }
    }

    /// Asks an optical drive for the first written block.
    fn medium_scan(ctx: &mut CommandContext<'_>, geometry: &Geometry) -> Option<u64> {
        let scan_length = geometry.total_blocks.min(LBA32_MAX) as u32;
        let command = DeviceCommand::Scsi(scsi::medium_scan_written(0));
        let issued = ctx.issue(
            &command,
            DataDirection::Out(scsi::medium_scan_parameters(1, scan_length)),
        );
        match issued.sense {
            Some(SenseClass::Equal {
                information: Some(lba),
            }) if lba < geometry.total_blocks => {
                debug!(lba, "MEDIUM SCAN found a written block");
                Some(lba)
            }
            _ => {
                debug!("MEDIUM SCAN unavailable or found nothing");
                None
            }
        }
    }

    fn random_lba(&mut self, geometry: &Geometry) -> u64 {
        if geometry.total_blocks <= 1 {
            0
        } else {
            self.rng.gen_range(1..geometry.total_blocks)
        }
    }

    fn required_addressing(family: DeviceFamily, geometry: &Geometry) -> &'static str {
        match family {
            DeviceFamily::Ata => match geometry.addressing {
                Some(AddressingMode::Chs) | None => AddressingMode::Chs.describe(),
                Some(_) if geometry.last_block() > LBA28_MAX => AddressingMode::Lba48.describe(),
                Some(_) => AddressingMode::Lba28.describe(),
            },
            DeviceFamily::Scsi if geometry.last_block() > LBA32_MAX => "64-bit LBA",
            DeviceFamily::Scsi => "32-bit LBA",
            DeviceFamily::Unsupported => "none",
        }
    }
}
