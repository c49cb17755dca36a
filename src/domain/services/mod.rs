//! Domain services
//!
//! The probing steps that turn an unknown device into a usable one. Each
//! works through a [`CommandContext`] and owns no device state.

mod capability_probe;
mod command_context;
mod geometry_resolver;
mod raw_read_detector;
mod transfer_tuner;
mod vendor_quirks;

pub use capability_probe::{CapabilityProbe, DEFAULT_PROBE_ATTEMPTS, ProbeReport};
pub use command_context::{CommandContext, Disposition, Issued};
pub use geometry_resolver::BlockGeometryResolver;
pub use raw_read_detector::RawReadDetector;
pub use transfer_tuner::TransferLengthTuner;
pub use vendor_quirks::{
    LONG_PROBE_SIZE, QuirkScope, RawProbe, RawProbeStrategy, SYQUEST_256_LONG_SIZE,
    SyQuestLongRead, VendorQuirk, VendorQuirkRegistry, VendorRawDvd,
};
