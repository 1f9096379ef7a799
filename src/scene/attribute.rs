//! Geometry and object attributes.

use crate::volume::VoxelPayload;

/// Packed description of an attribute's element type.
///
/// Field meanings follow the common shading-language convention: `basetype`
/// is the scalar kind, `aggregate` the component count, `vecsemantics` a
/// hint (color, point, vector, normal), `arraylen` 0 for non-arrays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TypeDesc {
    pub basetype: u8,
    pub aggregate: u8,
    pub vecsemantics: u8,
    pub reserved: u8,
    pub arraylen: i32,
}

impl TypeDesc {
    pub const FLOAT: Self = Self { basetype: 11, aggregate: 1, vecsemantics: 0, reserved: 0, arraylen: 0 };
    pub const COLOR: Self = Self { basetype: 11, aggregate: 3, vecsemantics: 1, reserved: 0, arraylen: 0 };
    pub const POINT: Self = Self { basetype: 11, aggregate: 3, vecsemantics: 2, reserved: 0, arraylen: 0 };
    pub const VECTOR: Self = Self { basetype: 11, aggregate: 3, vecsemantics: 3, reserved: 0, arraylen: 0 };
    pub const NORMAL: Self = Self { basetype: 11, aggregate: 3, vecsemantics: 4, reserved: 0, arraylen: 0 };
}

/// Where attribute data lives on the geometry.
pub mod element {
    pub const NONE: i32 = 0;
    pub const OBJECT: i32 = 1;
    pub const MESH: i32 = 2;
    pub const FACE: i32 = 3;
    pub const VERTEX: i32 = 4;
    pub const VERTEX_MOTION: i32 = 5;
    pub const CORNER: i32 = 6;
    pub const CORNER_BYTE: i32 = 7;
    pub const CURVE: i32 = 8;
    pub const CURVE_KEY: i32 = 9;
    pub const CURVE_KEY_MOTION: i32 = 10;
    pub const VOXEL: i32 = 11;
}

/// Payload of a geometry attribute.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum AttributeData {
    /// Declared but no data (missing or unreadable source).
    #[default]
    Empty,
    /// Raw element buffer.
    Buffer(Vec<u8>),
    /// Volumetric grid.
    Voxel(VoxelPayload),
}

/// Named per-geometry data channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub name: String,
    /// Standard attribute id (0 = custom).
    pub std: i32,
    pub type_desc: TypeDesc,
    pub element: i32,
    pub flags: u32,
    pub data: AttributeData,
}

impl Attribute {
    pub fn new(name: &str, type_desc: TypeDesc, element: i32) -> Self {
        Self {
            name: name.to_string(),
            std: 0,
            type_desc,
            element,
            flags: 0,
            data: AttributeData::Empty,
        }
    }

    pub fn is_voxel(&self) -> bool {
        self.element == element::VOXEL || matches!(self.data, AttributeData::Voxel(_))
    }
}

/// Per-object custom parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectAttribute {
    pub name: String,
    pub type_desc: TypeDesc,
    pub data: Vec<u8>,
    /// Interpolation hint passed through untouched.
    pub interp: i32,
}
