//! Device-ready grid level.
//!
//! Layout (little-endian):
//! ```text
//! [magic: 8 bytes "RBGRID01"]
//! [dims: u32 x 3]
//! [origin: f32 x 3]
//! [voxel_size: f32]
//! [values: f32 x dims.x*dims.y*dims.z]   x fastest
//! ```

use byteorder::{LittleEndian, ReadBytesExt};

use crate::util::{Error, Result, Vec3};

pub const DEVICE_GRID_MAGIC: &[u8; 8] = b"RBGRID01";
pub const DEVICE_GRID_HEADER_SIZE: usize = 8 + 12 + 12 + 4;

/// Samples one stored level at a world-space point.
pub trait LevelSampler {
    /// Value at `p`; zero outside the level or if the level is unreadable.
    fn sample(&self, level: &[u8], p: Vec3) -> f32;
}

/// Owned device grid, used to build levels.
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceGrid {
    pub dims: [u32; 3],
    pub origin: Vec3,
    pub voxel_size: f32,
    pub values: Vec<f32>,
}

impl DeviceGrid {
    /// Grid filled with a constant.
    pub fn filled(dims: [u32; 3], origin: Vec3, voxel_size: f32, value: f32) -> Self {
        let n = dims.iter().map(|d| *d as usize).product();
        Self { dims, origin, voxel_size, values: vec![value; n] }
    }

    pub fn set(&mut self, x: u32, y: u32, z: u32, value: f32) {
        let [dx, dy, dz] = self.dims;
        if x >= dx || y >= dy || z >= dz {
            return;
        }
        let i = (z as usize * dy as usize + y as usize) * dx as usize + x as usize;
        if let Some(v) = self.values.get_mut(i) {
            *v = value;
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(DEVICE_GRID_HEADER_SIZE + self.values.len() * 4);
        out.extend_from_slice(DEVICE_GRID_MAGIC);
        for d in self.dims {
            out.extend_from_slice(&d.to_le_bytes());
        }
        for c in self.origin.to_array() {
            out.extend_from_slice(&c.to_le_bytes());
        }
        out.extend_from_slice(&self.voxel_size.to_le_bytes());
        for v in &self.values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }
}

/// Borrowed view over a serialized level.
#[derive(Clone, Copy, Debug)]
pub struct DeviceGridView<'a> {
    pub dims: [u32; 3],
    pub origin: Vec3,
    pub voxel_size: f32,
    values: &'a [u8],
}

impl<'a> DeviceGridView<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < DEVICE_GRID_HEADER_SIZE {
            return Err(Error::UnexpectedEof(bytes.len() as u64));
        }
        if &bytes[0..8] != DEVICE_GRID_MAGIC {
            return Err(Error::invalid("device grid: bad magic"));
        }
        let mut rd = &bytes[8..DEVICE_GRID_HEADER_SIZE];
        let mut dims = [0u32; 3];
        rd.read_u32_into::<LittleEndian>(&mut dims)?;
        let mut origin = [0f32; 3];
        rd.read_f32_into::<LittleEndian>(&mut origin)?;
        let voxel_size = rd.read_f32::<LittleEndian>()?;
        if voxel_size.is_nan() || voxel_size <= 0.0 {
            return Err(Error::invalid("device grid: non-positive voxel size"));
        }

        let count = dims
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(*d as usize))
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| Error::invalid("device grid: dims overflow"))?;
        let values = &bytes[DEVICE_GRID_HEADER_SIZE..];
        if values.len() < count {
            return Err(Error::UnexpectedEof(bytes.len() as u64));
        }
        Ok(Self {
            dims,
            origin: Vec3::from_array(origin),
            voxel_size,
            values: &values[..count],
        })
    }

    /// Value at integer voxel coordinates; zero outside.
    pub fn voxel(&self, x: i64, y: i64, z: i64) -> f32 {
        let [dx, dy, dz] = self.dims.map(i64::from);
        if x < 0 || y < 0 || z < 0 || x >= dx || y >= dy || z >= dz {
            return 0.0;
        }
        let i = (((z * dy + y) * dx + x) * 4) as usize;
        let b = &self.values[i..i + 4];
        f32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    /// World point to voxel by `floor((p - origin) / voxel_size)`.
    pub fn sample_world(&self, p: Vec3) -> f32 {
        let idx = ((p - self.origin) / self.voxel_size).floor();
        if !idx.is_finite() {
            return 0.0;
        }
        self.voxel(idx.x as i64, idx.y as i64, idx.z as i64)
    }
}

/// Sampler for [`DeviceGrid`] levels.
#[derive(Clone, Copy, Debug, Default)]
pub struct DeviceGridSampler;

impl LevelSampler for DeviceGridSampler {
    fn sample(&self, level: &[u8], p: Vec3) -> f32 {
        match DeviceGridView::parse(level) {
            Ok(view) => view.sample_world(p),
            Err(_) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_world_sampling() {
        let mut g = DeviceGrid::filled([4, 4, 4], Vec3::splat(-1.0), 0.5, 0.0);
        g.set(2, 2, 2, 7.0);
        let bytes = g.to_bytes();
        let view = DeviceGridView::parse(&bytes).unwrap();
        assert_eq!(view.dims, [4, 4, 4]);
        // Voxel (2,2,2) covers world [0, 0.5).
        assert_eq!(view.sample_world(Vec3::splat(0.25)), 7.0);
        assert_eq!(view.sample_world(Vec3::splat(-0.25)), 0.0);
        assert_eq!(view.sample_world(Vec3::splat(100.0)), 0.0);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(DeviceGridView::parse(b"short").is_err());
        let mut bytes = DeviceGrid::filled([2, 2, 2], Vec3::ZERO, 1.0, 1.0).to_bytes();
        bytes[0] = b'X';
        assert!(DeviceGridView::parse(&bytes).is_err());

        let mut bytes = DeviceGrid::filled([2, 2, 2], Vec3::ZERO, 1.0, 1.0).to_bytes();
        bytes.truncate(bytes.len() - 4);
        assert!(DeviceGridView::parse(&bytes).is_err());
        assert_eq!(DeviceGridSampler.sample(&bytes, Vec3::ZERO), 0.0);
    }
}
