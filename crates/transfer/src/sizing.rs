use std::ops::Range;

/// Smallest unit ever used: 4 MiB.
pub const BASE_UNIT_SIZE: u64 = 4 * 1024 * 1024;

/// Files below this size use [`BASE_UNIT_SIZE`]; each further tier
/// multiplies the threshold by 4 and doubles the unit.
const BASE_THRESHOLD: u64 = 256 * 1024 * 1024;

const MAX_TIER: u32 = 4;

/// Largest unit ever used: 64 MiB, for files of 16 GiB and up.
pub const MAX_UNIT_SIZE: u64 = BASE_UNIT_SIZE << MAX_TIER;

/// Maps a file size to the unit size the service expects.
///
/// From 64 MiB up this is the service's own chunk table. Below that the
/// service would pick 1 or 2 MiB units; those files use 4 MiB instead.
///
/// | file size        | unit   |
/// |------------------|--------|
/// | < 256 MiB        | 4 MiB  |
/// | < 1 GiB          | 8 MiB  |
/// | < 4 GiB          | 16 MiB |
/// | < 16 GiB         | 32 MiB |
/// | otherwise        | 64 MiB |
pub fn unit_size(file_size: u64) -> u64 {
    (0..MAX_TIER)
        .find(|&tier| file_size < BASE_THRESHOLD << (2 * tier))
        .map_or(MAX_UNIT_SIZE, |tier| BASE_UNIT_SIZE << tier)
}

/// How a file of `size` bytes is divided into units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitLayout {
    size: u64,
    unit_size: u64,
}

impl UnitLayout {
    /// Layout using the standard [`unit_size`] policy.
    pub fn new(size: u64) -> Self {
        Self::with_unit_size(size, unit_size(size))
    }

    /// Layout with an explicit unit size. A zero unit size is clamped to 1.
    pub fn with_unit_size(size: u64, unit_size: u64) -> Self {
        Self {
            size,
            unit_size: unit_size.max(1),
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn unit_size(&self) -> u64 {
        self.unit_size
    }

    /// Number of units. A zero-byte file still has one (empty) unit.
    pub fn count(&self) -> usize {
        self.size.div_ceil(self.unit_size).max(1) as usize
    }

    /// Byte range of unit `index`, clipped to the file size.
    pub fn range(&self, index: usize) -> Range<u64> {
        let start = (index as u64).saturating_mul(self.unit_size).min(self.size);
        let end = start.saturating_add(self.unit_size).min(self.size);
        start..end
    }

    /// Length of unit `index`; the last unit carries the remainder.
    pub fn len(&self, index: usize) -> u64 {
        let r = self.range(index);
        r.end - r.start
    }

    /// Bytes represented by the `true` entries of `units`.
    pub fn bytes_for(&self, units: &[bool]) -> u64 {
        units
            .iter()
            .enumerate()
            .filter(|(_, done)| **done)
            .map(|(i, _)| self.len(i))
            .sum()
    }
}
