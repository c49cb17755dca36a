//! Vendor raw-read quirk registry
//!
//! Raw reads outside the SBC READ LONG commands are vendor specific. Each
//! entry pairs a manufacturer prefix with a probing strategy; the known
//! entries are best-effort and new ones can be registered at runtime.

use super::command_context::CommandContext;
use crate::domain::entities::{
    DeviceIdentity, Geometry, RAW_DVD_SECTOR_SIZE, RawReadCommand, RawReadProfile,
};
use crate::domain::repositories::SenseClass;
use crate::protocol::sense::ASC_INVALID_FIELD_IN_CDB;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Largest byte count a long read asks for when discovering the real size.
pub const LONG_PROBE_SIZE: u32 = 0xFFFF;
/// Long sector size of SyQuest media formatted with 256-byte sectors.
pub const SYQUEST_256_LONG_SIZE: u32 = 262;

/// Raw-read probing helpers bound to one trial address.
pub struct RawProbe<'c, 'a> {
    ctx: &'c mut CommandContext<'a>,
    geometry: &'c Geometry,
    lba: u64,
}

impl<'c, 'a> RawProbe<'c, 'a> {
    pub fn new(ctx: &'c mut CommandContext<'a>, geometry: &'c Geometry, lba: u64) -> Self {
        Self { ctx, geometry, lba }
    }

    pub fn geometry(&self) -> &Geometry {
        self.geometry
    }

    /// True when one long block of `size` bytes is read without error.
    pub fn accepts(&mut self, command: RawReadCommand, size: u32) -> bool {
        let Some(encoded) = command.encode(self.lba, 1, size) else {
            return false;
        };
        let ok = self.ctx.read(&encoded, size as usize).usable();
        debug!(?command, size, ok, "raw read trial");
        ok
    }

    /// Asks for [`LONG_PROBE_SIZE`] bytes and decodes the true long block
    /// size from the residue the drive reports when it rejects the length.
    pub fn reported_long_size(&mut self, command: RawReadCommand) -> Option<u32> {
        let encoded = command.encode(self.lba, 1, LONG_PROBE_SIZE)?;
        let issued = self.ctx.read(&encoded, LONG_PROBE_SIZE as usize);
        match issued.sense {
            Some(SenseClass::IllegalRequest {
                asc: ASC_INVALID_FIELD_IN_CDB,
                ascq: 0x00,
                information: Some(information),
                incorrect_length: true,
            }) => {
                let size = LONG_PROBE_SIZE - (information as u32 & 0xFFFF);
                debug!(?command, size, "drive reported long block size");
                (size > 0).then_some(size)
            }
            _ => None,
        }
    }
}

/// A way of establishing raw reads on a particular vendor's drives.
pub trait RawProbeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, probe: &mut RawProbe<'_, '_>) -> Option<RawReadProfile>;
}

/// Which devices an entry applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuirkScope {
    /// Disks and magneto-opticals (anything that is not a CD/DVD drive)
    BlockDevice,
    /// CD/DVD drives
    MultiMedia,
}

impl QuirkScope {
    pub fn of(identity: &DeviceIdentity) -> Self {
        if identity.peripheral_type.is_multimedia() {
            QuirkScope::MultiMedia
        } else {
            QuirkScope::BlockDevice
        }
    }
}

#[derive(Clone)]
pub struct VendorQuirk {
    pub vendor: String,
    pub scope: QuirkScope,
    pub strategy: Arc<dyn RawProbeStrategy>,
}

impl fmt::Debug for VendorQuirk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VendorQuirk")
            .field("vendor", &self.vendor)
            .field("scope", &self.scope)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct VendorQuirkRegistry {
    quirks: Vec<VendorQuirk>,
}

impl VendorQuirkRegistry {
    /// A registry with no entries.
    pub fn empty() -> Self {
        Self { quirks: Vec::new() }
    }

    /// The quirks known to work on real hardware.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("SYQUEST", QuirkScope::BlockDevice, SyQuestLongRead);
        registry.register(
            "HL-DT-ST",
            QuirkScope::MultiMedia,
            VendorRawDvd(RawReadCommand::HlDtStReadRawDvd),
        );
        registry.register(
            "PLEXTOR",
            QuirkScope::MultiMedia,
            VendorRawDvd(RawReadCommand::PlextorReadRawDvd),
        );
        registry
    }

    pub fn register(
        &mut self,
        vendor: impl Into<String>,
        scope: QuirkScope,
        strategy: impl RawProbeStrategy + 'static,
    ) {
        self.quirks.push(VendorQuirk {
            vendor: vendor.into(),
            scope,
            strategy: Arc::new(strategy),
        });
    }

    pub fn len(&self) -> usize {
        self.quirks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quirks.is_empty()
    }

    /// Entries whose vendor prefix and scope match the device, in registration order.
    pub fn matching<'r>(
        &'r self,
        identity: &'r DeviceIdentity,
    ) -> impl Iterator<Item = &'r VendorQuirk> + 'r {
        let scope = QuirkScope::of(identity);
        self.quirks
            .iter()
            .filter(move |q| q.scope == scope && identity.manufacturer_matches(&q.vendor))
    }
}

impl Default for VendorQuirkRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// SyQuest drives flag long reads with a vendor bit on READ(10)/READ(6).
pub struct SyQuestLongRead;

impl RawProbeStrategy for SyQuestLongRead {
    fn name(&self) -> &'static str {
        "SyQuest long read"
    }

    fn detect(&self, probe: &mut RawProbe<'_, '_>) -> Option<RawReadProfile> {
        for command in [
            RawReadCommand::SyQuestReadLong10,
            RawReadCommand::SyQuestReadLong6,
        ] {
            if let Some(size) = probe.reported_long_size(command)
                && probe.accepts(command, size)
            {
                return Some(RawReadProfile::with(command, size));
            }
        }

        if probe.geometry().logical_block_size == 256
            && probe.accepts(RawReadCommand::SyQuestReadLong6, SYQUEST_256_LONG_SIZE)
        {
            return Some(RawReadProfile::with(
                RawReadCommand::SyQuestReadLong6,
                SYQUEST_256_LONG_SIZE,
            ));
        }
        None
    }
}

/// Vendor commands returning 2064-byte raw DVD sectors.
pub struct VendorRawDvd(pub RawReadCommand);

impl RawProbeStrategy for VendorRawDvd {
    fn name(&self) -> &'static str {
        match self.0 {
            RawReadCommand::HlDtStReadRawDvd => "HL-DT-ST raw DVD read",
            RawReadCommand::PlextorReadRawDvd => "Plextor raw DVD read",
            _ => "raw DVD read",
        }
    }

    fn detect(&self, probe: &mut RawProbe<'_, '_>) -> Option<RawReadProfile> {
        probe
            .accepts(self.0, RAW_DVD_SECTOR_SIZE)
            .then(|| RawReadProfile::with(self.0, RAW_DVD_SECTOR_SIZE))
    }
}
