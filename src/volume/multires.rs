//! Multi-resolution grid container.
//!
//! ```text
//! 0      [count: u64][zero pad to 32]
//! 32     block 0:  [next: u64][level 0 bytes][pad to 32]
//! ...    block i:  [next: u64][level i bytes][pad to 32]
//! last   block n-1:           [level n-1 bytes][pad to 32]
//! ```
//! `next` is the start of the following block plus 8, so the reader steps to
//! `next - 8`. The last block has no `next` field and its level starts at the
//! block start.

use std::ops::Range;

use byteorder::{ByteOrder, LittleEndian};

use super::device::LevelSampler;
use crate::util::{Error, Result, Vec3};

pub const MULTIRES_ALIGNMENT: usize = 32;
pub const MULTIRES_HEADER_SIZE: usize = 32;
const OFFSET_FIELD: usize = 8;

#[inline]
pub const fn align32(n: usize) -> usize {
    (n + (MULTIRES_ALIGNMENT - 1)) & !(MULTIRES_ALIGNMENT - 1)
}

/// Parsed multi-resolution payload; level ranges are validated once.
#[derive(Clone, Debug, PartialEq)]
pub struct MultiResGrid {
    bytes: Vec<u8>,
    levels: Vec<Range<usize>>,
}

impl MultiResGrid {
    /// Parse and validate the level layout.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < OFFSET_FIELD {
            return Err(Error::UnexpectedEof(bytes.len() as u64));
        }
        let count = LittleEndian::read_u64(&bytes[0..OFFSET_FIELD]);
        let mut levels = Vec::new();
        if count == 0 {
            return Ok(Self { bytes, levels });
        }
        if count > (bytes.len() / OFFSET_FIELD) as u64 {
            return Err(Error::invalid(format!("multires: level count {count} exceeds payload")));
        }

        let count = count as usize;
        let mut block = MULTIRES_HEADER_SIZE;
        for i in 0..count {
            if i + 1 < count {
                let field_end = block + OFFSET_FIELD;
                if field_end > bytes.len() {
                    return Err(Error::UnexpectedEof(field_end as u64));
                }
                let next = LittleEndian::read_u64(&bytes[block..field_end]) as usize;
                let next_block = next
                    .checked_sub(OFFSET_FIELD)
                    .filter(|nb| *nb >= field_end && *nb <= bytes.len())
                    .ok_or_else(|| {
                        Error::invalid(format!("multires: level {i} has bad next offset {next}"))
                    })?;
                levels.push(field_end..next_block);
                block = next_block;
            } else {
                if block > bytes.len() {
                    return Err(Error::UnexpectedEof(block as u64));
                }
                levels.push(block..bytes.len());
            }
        }
        Ok(Self { bytes, levels })
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Bytes of level `i` including trailing alignment padding.
    pub fn level(&self, i: usize) -> Option<&[u8]> {
        self.levels.get(i).map(|r| &self.bytes[r.clone()])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// First non-zero sample in stored level order, else zero.
    pub fn query(&self, p: Vec3, sampler: &dyn LevelSampler) -> f32 {
        for range in &self.levels {
            let v = sampler.sample(&self.bytes[range.clone()], p);
            if v != 0.0 {
                return v;
            }
        }
        0.0
    }

    /// Index of the level answering [`query`](Self::query), if any.
    pub fn resident_level(&self, p: Vec3, sampler: &dyn LevelSampler) -> Option<usize> {
        self.levels
            .iter()
            .position(|r| sampler.sample(&self.bytes[r.clone()], p) != 0.0)
    }
}

/// Builds the container from level payloads.
#[derive(Default)]
pub struct MultiResWriter {
    levels: Vec<Vec<u8>>,
}

impl MultiResWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_level(&mut self, level: Vec<u8>) -> &mut Self {
        self.levels.push(level);
        self
    }

    pub fn finish(&self) -> Vec<u8> {
        let n = self.levels.len();
        let mut out = vec![0u8; MULTIRES_HEADER_SIZE];
        LittleEndian::write_u64(&mut out[0..OFFSET_FIELD], n as u64);

        // Block start of each level.
        let mut starts = Vec::with_capacity(n);
        let mut pos = MULTIRES_HEADER_SIZE;
        for (i, level) in self.levels.iter().enumerate() {
            starts.push(pos);
            if i + 1 < n {
                pos += OFFSET_FIELD;
            }
            pos += align32(level.len());
        }

        for (i, level) in self.levels.iter().enumerate() {
            if i + 1 < n {
                let next = (starts[i + 1] + OFFSET_FIELD) as u64;
                out.extend_from_slice(&next.to_le_bytes());
            }
            out.extend_from_slice(level);
            out.resize(out.len() + align32(level.len()) - level.len(), 0);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::device::{DeviceGrid, DeviceGridSampler};

    fn level(value: f32, hole: Option<[u32; 3]>) -> Vec<u8> {
        let mut g = DeviceGrid::filled([2, 2, 2], Vec3::ZERO, 1.0, value);
        if let Some([x, y, z]) = hole {
            g.set(x, y, z, 0.0);
        }
        g.to_bytes()
    }

    #[test]
    fn test_zero_levels_yields_zero() {
        let bytes = MultiResWriter::new().finish();
        assert_eq!(bytes.len(), MULTIRES_HEADER_SIZE);
        let grid = MultiResGrid::from_bytes(bytes).unwrap();
        assert_eq!(grid.level_count(), 0);
        for p in [Vec3::ZERO, Vec3::splat(0.5), Vec3::splat(-10.0)] {
            assert_eq!(grid.query(p, &DeviceGridSampler), 0.0);
        }

        // Count field alone, no padding.
        let grid = MultiResGrid::from_bytes(0u64.to_le_bytes().to_vec()).unwrap();
        assert_eq!(grid.query(Vec3::ZERO, &DeviceGridSampler), 0.0);
    }

    #[test]
    fn test_layout_offsets() {
        let l0 = vec![1u8; 40];
        let l1 = vec![2u8; 10];
        let l2 = vec![3u8; 5];
        let mut w = MultiResWriter::new();
        w.push_level(l0.clone()).push_level(l1.clone()).push_level(l2.clone());
        let bytes = w.finish();

        // Block 1 starts at 32 + 8 + 64 = 104; stored next is 112.
        assert_eq!(LittleEndian::read_u64(&bytes[32..40]), 112);
        let grid = MultiResGrid::from_bytes(bytes).unwrap();
        assert_eq!(grid.level_count(), 3);
        assert_eq!(&grid.level(0).unwrap()[..40], &l0[..]);
        assert_eq!(&grid.level(1).unwrap()[..10], &l1[..]);
        assert_eq!(&grid.level(2).unwrap()[..5], &l2[..]);
    }

    #[test]
    fn test_residency_prefers_first_nonzero_level() {
        let mut w = MultiResWriter::new();
        w.push_level(level(1.0, Some([0, 0, 0])))
            .push_level(level(2.0, None))
            .push_level(level(3.0, None));
        let grid = MultiResGrid::from_bytes(w.finish()).unwrap();

        assert_eq!(grid.query(Vec3::new(1.5, 0.5, 0.5), &DeviceGridSampler), 1.0);
        // Hole in level 0 falls through to level 1.
        assert_eq!(grid.query(Vec3::splat(0.5), &DeviceGridSampler), 2.0);
        assert_eq!(grid.resident_level(Vec3::splat(0.5), &DeviceGridSampler), Some(1));
        // Outside all levels.
        assert_eq!(grid.query(Vec3::splat(9.0), &DeviceGridSampler), 0.0);
        assert_eq!(grid.resident_level(Vec3::splat(9.0), &DeviceGridSampler), None);
    }

    #[test]
    fn test_corrupt_offsets_rejected() {
        let mut w = MultiResWriter::new();
        w.push_level(vec![0; 16]).push_level(vec![0; 16]);
        let mut bytes = w.finish();
        bytes[32..40].copy_from_slice(&4u64.to_le_bytes());
        assert!(MultiResGrid::from_bytes(bytes).is_err());

        let mut bytes = 1000u64.to_le_bytes().to_vec();
        bytes.resize(64, 0);
        assert!(MultiResGrid::from_bytes(bytes).is_err());
        assert!(MultiResGrid::from_bytes(vec![1, 2]).is_err());
    }
}
