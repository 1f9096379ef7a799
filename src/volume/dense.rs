//! Flattened dense voxel grid with explicit dimensions and element type.

use half::f16;

use crate::util::{Error, Result};

/// Storage type of one dense-grid channel value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Byte,
    Half,
    UShort,
    Float,
}

impl ScalarKind {
    /// Parse the index name; anything unrecognized is `Float`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "byte" => Self::Byte,
            "half" => Self::Half,
            "ushort" => Self::UShort,
            _ => Self::Float,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Half => "half",
            Self::UShort => "ushort",
            Self::Float => "float",
        }
    }

    pub const fn size(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Half | Self::UShort => 2,
            Self::Float => 4,
        }
    }
}

/// Dense grid as stored in the blob.
#[derive(Clone, Debug, PartialEq)]
pub struct DenseGrid {
    pub dims: [u32; 3],
    pub scale: [f32; 3],
    pub kind: ScalarKind,
    pub channels: u32,
    pub data: Vec<u8>,
}

impl DenseGrid {
    /// Byte length implied by dims, channels and element type; `None` if it
    /// does not fit in `usize`.
    pub fn expected_len(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(1usize, |n, d| n.checked_mul(*d as usize))?
            .checked_mul(self.channels as usize)?
            .checked_mul(self.kind.size())
    }

    /// Check that the buffer matches the declared layout.
    pub fn validate(&self) -> Result<()> {
        if self.channels != 1 && self.channels != 4 {
            return Err(Error::invalid(format!(
                "dense grid with {} channels (expected 1 or 4)",
                self.channels
            )));
        }
        let Some(expected) = self.expected_len() else {
            return Err(Error::invalid(format!("dense grid dimensions {:?} overflow", self.dims)));
        };
        if self.data.len() < expected {
            return Err(Error::UnexpectedEof(self.data.len() as u64));
        }
        Ok(())
    }

    /// Device texture format name, e.g. `half` or `byte4`.
    pub fn data_type_name(&self) -> String {
        if self.channels == 4 {
            format!("{}4", self.kind.name())
        } else {
            self.kind.name().to_string()
        }
    }

    /// Normalized value of `channel` at integer voxel `(x, y, z)`; zero outside.
    pub fn sample(&self, x: i64, y: i64, z: i64, channel: u32) -> f32 {
        let [dx, dy, dz] = self.dims.map(i64::from);
        if x < 0 || y < 0 || z < 0 || x >= dx || y >= dy || z >= dz || channel >= self.channels {
            return 0.0;
        }
        let size = self.kind.size();
        let start = z
            .checked_mul(dy)
            .and_then(|v| v.checked_add(y))
            .and_then(|v| v.checked_mul(dx))
            .and_then(|v| v.checked_add(x))
            .and_then(|v| usize::try_from(v).ok())
            .and_then(|v| v.checked_mul(self.channels as usize))
            .and_then(|v| v.checked_add(channel as usize))
            .and_then(|v| v.checked_mul(size));
        let Some(b) = start.and_then(|s| self.data.get(s..s.checked_add(size)?)) else {
            return 0.0;
        };
        match self.kind {
            ScalarKind::Byte => b[0] as f32 / 255.0,
            ScalarKind::Half => f16::from_le_bytes([b[0], b[1]]).to_f32(),
            ScalarKind::UShort => u16::from_le_bytes([b[0], b[1]]) as f32 / 65535.0,
            ScalarKind::Float => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_kind_names() {
        assert_eq!(ScalarKind::from_name("half"), ScalarKind::Half);
        assert_eq!(ScalarKind::from_name("double"), ScalarKind::Float);
        assert_eq!(ScalarKind::UShort.size(), 2);
    }

    #[test]
    fn test_half_sampling() {
        let values = [0.0f32, 0.5, 1.0, 2.0];
        let data: Vec<u8> = values.iter().flat_map(|v| f16::from_f32(*v).to_le_bytes()).collect();
        let grid = DenseGrid {
            dims: [2, 2, 1],
            scale: [1.0; 3],
            kind: ScalarKind::Half,
            channels: 1,
            data,
        };
        grid.validate().unwrap();
        assert_eq!(grid.sample(1, 0, 0, 0), 0.5);
        assert_eq!(grid.sample(1, 1, 0, 0), 2.0);
        assert_eq!(grid.sample(2, 0, 0, 0), 0.0);
        assert_eq!(grid.data_type_name(), "half");
    }

    #[test]
    fn test_validate_rejects_short_buffer_and_bad_channels() {
        let mut grid = DenseGrid {
            dims: [4, 4, 4],
            scale: [1.0; 3],
            kind: ScalarKind::Byte,
            channels: 4,
            data: vec![0; 10],
        };
        assert!(grid.validate().is_err());
        assert_eq!(grid.data_type_name(), "byte4");
        assert_eq!(grid.expected_len(), Some(4 * 4 * 4 * 4));
        grid.channels = 3;
        grid.data = vec![0; 4 * 4 * 4 * 3];
        assert!(grid.validate().is_err());
    }

    #[test]
    fn test_overflowing_dims_rejected() {
        let grid = DenseGrid {
            dims: [u32::MAX; 3],
            scale: [1.0; 3],
            kind: ScalarKind::Float,
            channels: 1,
            data: vec![0; 16],
        };
        assert_eq!(grid.expected_len(), None);
        assert!(matches!(grid.validate(), Err(Error::InvalidStructure(_))));
        assert_eq!(grid.sample(i64::from(u32::MAX) - 1, i64::from(u32::MAX) - 1, 1, 0), 0.0);
    }
}
