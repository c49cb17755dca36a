//! Block geometry resolution
//!
//! ATA devices describe themselves through IDENTIFY data captured when they
//! were opened. SCSI devices are asked with READ CAPACITY, falling back from
//! the 10-byte to the 16-byte form.

use super::command_context::CommandContext;
use crate::domain::entities::{AddressingMode, ChsGeometry, DeviceFamily, DeviceIdentity, Geometry};
use crate::domain::repositories::DeviceCommand;
use crate::error::{ReaderError, Result};
use crate::protocol::AtaIdentify;
use crate::protocol::scsi::{self, Capacity, LBA32_MAX, PeripheralType};
use tracing::{debug, info, warn};

const READ_CAPACITY16_LENGTH: u32 = 32;

pub struct BlockGeometryResolver;

impl BlockGeometryResolver {
    pub fn resolve(
        ctx: &mut CommandContext<'_>,
        family: DeviceFamily,
        identity: &DeviceIdentity,
    ) -> Result<Geometry> {
        let geometry = match family {
            DeviceFamily::Ata => {
                let identify = identity.ata.as_ref().ok_or(ReaderError::MissingIdentify)?;
                Self::from_identify(identify)?
            }
            DeviceFamily::Scsi => Self::from_capacity(ctx, identity)?,
            DeviceFamily::Unsupported => return Err(ReaderError::UnsupportedDevice),
        };

        info!(
            family = %family,
            block_size = geometry.logical_block_size,
            physical_block_size = geometry.physical_block_size,
            blocks = geometry.total_blocks,
            capacity_known = geometry.capacity_known,
            "geometry resolved"
        );
        Ok(geometry)
    }

    /// Geometry from IDENTIFY DEVICE data.
    pub fn from_identify(identify: &AtaIdentify) -> Result<Geometry> {
        let current = ChsGeometry {
            cylinders: identify.current_cylinders,
            heads: identify.current_heads,
            sectors_per_track: identify.current_sectors_per_track,
        };
        let default = ChsGeometry {
            cylinders: identify.default_cylinders,
            heads: identify.default_heads,
            sectors_per_track: identify.default_sectors_per_track,
        };
        let chs = if current.is_valid() { current } else { default };

        let mut total_blocks = chs.total_sectors();
        let mut addressing = AddressingMode::Chs;
        if identify.lba_supported {
            total_blocks = identify.lba28_sectors as u64;
            addressing = AddressingMode::Lba28;
        }
        if identify.lba48_supported {
            total_blocks = identify.lba48_sectors;
            addressing = AddressingMode::Lba48;
        }

        let logical_block_size = if identify.logical_sector_size == 0 {
            512
        } else {
            identify.logical_sector_size
        };
        let physical_block_size = identify.physical_sector_size.max(logical_block_size);

        if total_blocks == 0 {
            return Err(ReaderError::GeometryUnresolvable(
                "IDENTIFY data reports no addressable sectors".to_string(),
            ));
        }
        debug!(
            cylinders = chs.cylinders,
            heads = chs.heads,
            sectors = chs.sectors_per_track,
            addressing = %addressing,
            "ATA geometry"
        );

        Ok(Geometry {
            logical_block_size,
            physical_block_size,
            total_blocks,
            chs: chs.is_valid().then_some(chs),
            addressing: Some(addressing),
            capacity_known: true,
        })
    }

    fn from_capacity(ctx: &mut CommandContext<'_>, identity: &DeviceIdentity) -> Result<Geometry> {
        let rc10 = Self::read_capacity10(ctx);
        let (capacity, capacity_known) = match rc10 {
            Some(cap) if !cap.is_saturated() => (Some(cap), true),
            // A saturated 10-byte answer still bounds the device from below
            _ => match Self::read_capacity16(ctx) {
                Some(cap) => (Some(cap), true),
                None => (rc10, false),
            },
        };

        match capacity {
            Some(cap) if cap.block_length > 0 && cap.total_blocks() > 0 => {
                Ok(Geometry {
                    logical_block_size: cap.block_length,
                    physical_block_size: cap.physical_block_size().max(cap.block_length),
                    total_blocks: cap.total_blocks(),
                    chs: None,
                    addressing: None,
                    capacity_known,
                })
            }
            _ if identity.is_optical() => {
                let provisional = Self::provisional_block_size(identity.peripheral_type);
                warn!(
                    block_size = provisional,
                    "optical device did not report capacity, block size will be learned"
                );
                Ok(Geometry {
                    logical_block_size: provisional,
                    physical_block_size: provisional,
                    total_blocks: LBA32_MAX + 1,
                    chs: None,
                    addressing: None,
                    capacity_known: false,
                })
            }
            _ => Err(ReaderError::GeometryUnresolvable(
                "READ CAPACITY failed".to_string(),
            )),
        }
    }

    fn provisional_block_size(peripheral: PeripheralType) -> u32 {
        if peripheral.is_multimedia() { 2048 } else { 512 }
    }

    fn read_capacity10(ctx: &mut CommandContext<'_>) -> Option<Capacity> {
        let issued = ctx.read(&DeviceCommand::Scsi(scsi::read_capacity10()), 8);
        if !issued.usable() {
            debug!("READ CAPACITY(10) failed");
            return None;
        }
        Capacity::parse10(&issued.outcome.data)
    }

    fn read_capacity16(ctx: &mut CommandContext<'_>) -> Option<Capacity> {
        let issued = ctx.read(
            &DeviceCommand::Scsi(scsi::read_capacity16(READ_CAPACITY16_LENGTH)),
            READ_CAPACITY16_LENGTH as usize,
        );
        if !issued.usable() {
            debug!("READ CAPACITY(16) failed");
            return None;
        }
        Capacity::parse16(&issued.outcome.data)
    }
}
