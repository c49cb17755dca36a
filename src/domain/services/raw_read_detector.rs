//! Raw (long) read detection
//!
//! Works out whether the device returns sectors with their ECC and header
//! bytes, and through which command. The SBC READ LONG path comes first,
//! then known long sizes, then vendor commands from the quirk registry.

use super::command_context::CommandContext;
use super::vendor_quirks::{RawProbe, VendorQuirkRegistry};
use crate::domain::entities::{
    DVD_ECC_BLOCK_SIZE, DeviceFamily, DeviceIdentity, Geometry, RawReadCommand, RawReadProfile,
};
use tracing::{debug, info};

/// Long sector sizes seen in the wild for each logical size.
const LONG_SIZE_CANDIDATES: [(u32, &[u32]); 4] = [
    (512, &[514, 536, 558, 600, 610, 630]),
    (2048, &[2380]),
    (4096, &[4760]),
    (8192, &[9424]),
];

pub struct RawReadDetector<'r> {
    registry: &'r VendorQuirkRegistry,
}

impl<'r> RawReadDetector<'r> {
    pub fn new(registry: &'r VendorQuirkRegistry) -> Self {
        Self { registry }
    }

    /// Never fails: a device without raw reads gets an unsupported profile.
    pub fn detect(
        &self,
        ctx: &mut CommandContext<'_>,
        family: DeviceFamily,
        identity: &DeviceIdentity,
        geometry: &Geometry,
        trial_lba: u64,
    ) -> RawReadProfile {
        if family != DeviceFamily::Scsi {
            debug!(%family, "raw reads are only probed on SCSI devices");
            return RawReadProfile::unsupported();
        }

        let mut probe = RawProbe::new(ctx, geometry, trial_lba);
        let found = if identity.peripheral_type.is_multimedia() {
            self.detect_multimedia(&mut probe, identity)
        } else {
            self.detect_block_device(&mut probe, identity)
        };

        match found {
            Some(profile) if profile.long_block_size >= geometry.logical_block_size => {
                info!(
                    command = ?profile.command,
                    long_block_size = profile.long_block_size,
                    "raw reads available"
                );
                profile
            }
            Some(profile) => {
                debug!(
                    long_block_size = profile.long_block_size,
                    "long block smaller than the logical block, ignored"
                );
                RawReadProfile::unsupported()
            }
            None => {
                info!("raw reads unavailable");
                RawReadProfile::unsupported()
            }
        }
    }

    fn detect_block_device(
        &self,
        probe: &mut RawProbe<'_, '_>,
        identity: &DeviceIdentity,
    ) -> Option<RawReadProfile> {
        let logical = probe.geometry().logical_block_size;

        if let Some(size) = probe.reported_long_size(RawReadCommand::ReadLong10)
            && probe.accepts(RawReadCommand::ReadLong10, size)
        {
            if size != logical {
                return Some(RawReadProfile::with(RawReadCommand::ReadLong10, size));
            }
            // The drive answers with the cooked size; it may still take a longer one.
            if let Some(profile) = Self::walk_candidates(probe, logical) {
                return Some(profile);
            }
        }

        self.try_vendors(probe, identity)
    }

    fn detect_multimedia(
        &self,
        probe: &mut RawProbe<'_, '_>,
        identity: &DeviceIdentity,
    ) -> Option<RawReadProfile> {
        if let Some(profile) = self.try_vendors(probe, identity) {
            return Some(profile);
        }
        probe
            .accepts(RawReadCommand::DvdEccBlockReadLong10, DVD_ECC_BLOCK_SIZE)
            .then(|| RawReadProfile::with(RawReadCommand::DvdEccBlockReadLong10, DVD_ECC_BLOCK_SIZE))
    }

    fn walk_candidates(probe: &mut RawProbe<'_, '_>, logical: u32) -> Option<RawReadProfile> {
        for &size in Self::candidates_for(logical) {
            for command in [RawReadCommand::ReadLong16, RawReadCommand::ReadLong10] {
                if probe.accepts(command, size) {
                    return Some(RawReadProfile::with(command, size));
                }
            }
        }
        None
    }

    fn try_vendors(
        &self,
        probe: &mut RawProbe<'_, '_>,
        identity: &DeviceIdentity,
    ) -> Option<RawReadProfile> {
        self.registry.matching(identity).find_map(|quirk| {
            debug!(vendor = %quirk.vendor, strategy = quirk.strategy.name(), "trying vendor raw read");
            quirk.strategy.detect(probe)
        })
    }

    /// Long block sizes worth trying for a logical block size.
    pub fn candidates_for(logical: u32) -> &'static [u32] {
        LONG_SIZE_CANDIDATES
            .iter()
            .find(|(cooked, _)| *cooked == logical)
            .map(|(_, sizes)| *sizes)
            .unwrap_or(&[])
    }
}
