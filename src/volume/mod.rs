//! Volumetric voxel payloads.
//!
//! Four sub-encodings are carried on voxel attributes, selected by the
//! `volume_type` discriminator in the index:
//!
//! - `openvdb`: an opaque sparse-grid stream plus the grid name to pick from it
//! - `raw`: a flattened [`DenseGrid`]
//! - `nanovdb`: a device-ready grid buffer
//! - `nanovdb_multires`: a [`MultiResGrid`] container of device-ready levels

mod dense;
mod device;
mod multires;

pub use dense::*;
pub use device::*;
pub use multires::*;

use crate::wire::format::volume_type;

/// Voxel data attached to a geometry attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum VoxelPayload {
    /// Sparse-grid stream, kept opaque.
    SparseStream { data: Vec<u8>, grid: String },
    /// Dense grid with explicit dimensions.
    Dense(DenseGrid),
    /// Single device-ready grid.
    Device(Vec<u8>),
    /// Multi-resolution device-ready grid.
    MultiRes(MultiResGrid),
}

impl VoxelPayload {
    /// Value of the `volume_type` discriminator for this payload.
    pub fn discriminator(&self) -> &'static str {
        match self {
            Self::SparseStream { .. } => volume_type::OPENVDB,
            Self::Dense(_) => volume_type::RAW,
            Self::Device(_) => volume_type::NANOVDB,
            Self::MultiRes(_) => volume_type::NANOVDB_MULTIRES,
        }
    }

    /// Serialized bytes as stored in the blob.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::SparseStream { data, .. } => data,
            Self::Dense(grid) => &grid.data,
            Self::Device(data) => data,
            Self::MultiRes(grid) => grid.as_bytes(),
        }
    }

    /// Build a payload from stored bytes for a discriminator that needs no
    /// extra attributes. `raw` needs its layout and is handled by the decoder.
    pub fn from_bytes(discriminator: &str, data: Vec<u8>, grid: &str) -> crate::util::Result<Self> {
        match discriminator {
            volume_type::OPENVDB => Ok(Self::SparseStream { data, grid: grid.to_string() }),
            volume_type::NANOVDB => Ok(Self::Device(data)),
            volume_type::NANOVDB_MULTIRES => Ok(Self::MultiRes(MultiResGrid::from_bytes(data)?)),
            other => Err(crate::util::Error::invalid(format!("unknown volume type '{other}'"))),
        }
    }
}
