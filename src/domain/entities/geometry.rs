//! Block geometry entity

use super::device::AddressingMode;

/// A cylinder/head/sector address. Sectors count from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chs {
    pub cylinder: u16,
    pub head: u8,
    pub sector: u8,
}

impl Chs {
    pub fn new(cylinder: u16, head: u8, sector: u8) -> Self {
        Self {
            cylinder,
            head,
            sector,
        }
    }
}

/// Where a command is aimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockAddress {
    Lba(u64),
    Chs(Chs),
}

/// Legacy ATA geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChsGeometry {
    pub cylinders: u16,
    pub heads: u16,
    pub sectors_per_track: u16,
}

impl ChsGeometry {
    pub fn total_sectors(&self) -> u64 {
        self.cylinders as u64 * self.heads as u64 * self.sectors_per_track as u64
    }

    pub fn is_valid(&self) -> bool {
        self.cylinders > 0 && self.heads > 0 && self.sectors_per_track > 0
    }

    /// Translates a linear block number into a CHS triple.
    pub fn to_chs(&self, lba: u64) -> Option<Chs> {
        if !self.is_valid() || lba >= self.total_sectors() {
            return None;
        }
        let spt = self.sectors_per_track as u64;
        let heads = self.heads as u64;
        let cylinder = lba / (heads * spt);
        let head = (lba / spt) % heads;
        let sector = lba % spt + 1;
        Some(Chs {
            cylinder: u16::try_from(cylinder).ok()?,
            head: u8::try_from(head).ok()?,
            sector: u8::try_from(sector).ok()?,
        })
    }

    /// Translates a CHS triple into a linear block number.
    pub fn to_lba(&self, chs: Chs) -> Option<u64> {
        if chs.sector == 0
            || chs.cylinder >= self.cylinders
            || chs.head as u16 >= self.heads
            || chs.sector as u16 > self.sectors_per_track
        {
            return None;
        }
        let spt = self.sectors_per_track as u64;
        let heads = self.heads as u64;
        Some((chs.cylinder as u64 * heads + chs.head as u64) * spt + chs.sector as u64 - 1)
    }
}

/// Resolved block geometry of a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    /// Bytes per logical block
    pub logical_block_size: u32,
    /// Bytes per physical block (at least the logical size)
    pub physical_block_size: u32,
    /// Number of logical blocks
    pub total_blocks: u64,
    /// CHS geometry, ATA only
    pub chs: Option<ChsGeometry>,
    /// Addressing the device needs, ATA only
    pub addressing: Option<AddressingMode>,
    /// False when the device did not report its capacity and
    /// `total_blocks` is a provisional upper bound
    pub capacity_known: bool,
}

impl Geometry {
    pub fn last_block(&self) -> u64 {
        self.total_blocks.saturating_sub(1)
    }

    /// True when `count` blocks starting at `start` lie on the device.
    pub fn contains(&self, start: u64, count: u32) -> bool {
        count > 0
            && start
                .checked_add(count as u64)
                .is_some_and(|end| end <= self.total_blocks)
    }

    /// Byte length of `count` logical blocks.
    pub fn byte_len(&self, count: u32) -> usize {
        self.logical_block_size as usize * count as usize
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_blocks.saturating_mul(self.logical_block_size as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chs() -> ChsGeometry {
        ChsGeometry {
            cylinders: 1024,
            heads: 16,
            sectors_per_track: 63,
        }
    }

    #[test]
    fn test_chs_translation_round_trip_edges() {
        let geometry = chs();
        assert_eq!(geometry.to_chs(0), Some(Chs::new(0, 0, 1)));
        assert_eq!(geometry.to_chs(63), Some(Chs::new(0, 1, 1)));
        let last = geometry.total_sectors() - 1;
        assert_eq!(geometry.to_chs(last), Some(Chs::new(1023, 15, 63)));
        assert_eq!(geometry.to_lba(Chs::new(1023, 15, 63)), Some(last));
        assert_eq!(geometry.to_chs(last + 1), None);
    }

    #[test]
    fn test_chs_rejects_sector_zero() {
        assert_eq!(chs().to_lba(Chs::new(0, 0, 0)), None);
    }

    #[test]
    fn test_contains() {
        let geometry = Geometry {
            logical_block_size: 512,
            physical_block_size: 512,
            total_blocks: 100,
            chs: None,
            addressing: None,
            capacity_known: true,
        };
        assert!(geometry.contains(99, 1));
        assert!(!geometry.contains(99, 2));
        assert!(!geometry.contains(0, 0));
        assert!(!geometry.contains(u64::MAX, 1));
    }
}
