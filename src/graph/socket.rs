//! Socket declarations: types, flags, enum tables.

use std::fmt;
use std::sync::Arc;

use super::value::SocketValue;

/// Declared type of a socket.
///
/// Array variants store their payload in the blob when a blob is attached
/// to the encoder, otherwise inline as space-separated tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketType {
    Boolean,
    Int,
    Int64,
    UInt,
    Float,
    Float2,
    /// 3-vector; color, vector, point and normal all share this layout.
    Float3,
    Float4,
    Transform,
    Enum,
    String,
    /// Reference to another scene node by name.
    Node,
    /// Shader closure; only ever carried by links.
    Closure,
    BooleanArray,
    IntArray,
    FloatArray,
    Float2Array,
    Float3Array,
    TransformArray,
    StringArray,
    NodeArray,
}

impl SocketType {
    /// Name used in the index `type_name` attribute.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Int => "int",
            Self::Int64 => "int64",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Float2 => "float2",
            Self::Float3 => "float3",
            Self::Float4 => "float4",
            Self::Transform => "transform",
            Self::Enum => "enum",
            Self::String => "string",
            Self::Node => "node",
            Self::Closure => "closure",
            Self::BooleanArray => "array_boolean",
            Self::IntArray => "array_int",
            Self::FloatArray => "array_float",
            Self::Float2Array => "array_float2",
            Self::Float3Array => "array_float3",
            Self::TransformArray => "array_transform",
            Self::StringArray => "array_string",
            Self::NodeArray => "array_node",
        }
    }

    /// True for variable-length array types.
    pub const fn is_array(self) -> bool {
        matches!(
            self,
            Self::BooleanArray
                | Self::IntArray
                | Self::FloatArray
                | Self::Float2Array
                | Self::Float3Array
                | Self::TransformArray
                | Self::StringArray
                | Self::NodeArray
        )
    }

    /// True for arrays whose elements are fixed-size and can live in the blob.
    pub const fn is_numeric_array(self) -> bool {
        self.is_array() && !matches!(self, Self::StringArray | Self::NodeArray)
    }

    /// Byte size of one element (arrays) or of the value (scalars).
    /// Zero for string, node and closure types.
    pub const fn element_size(self) -> usize {
        match self {
            Self::Boolean | Self::BooleanArray => 1,
            Self::Int | Self::UInt | Self::Float | Self::Enum | Self::IntArray | Self::FloatArray => 4,
            Self::Int64 | Self::Float2 | Self::Float2Array => 8,
            Self::Float3 | Self::Float3Array => 12,
            Self::Float4 => 16,
            Self::Transform | Self::TransformArray => 48,
            Self::String | Self::StringArray | Self::Node | Self::NodeArray | Self::Closure => 0,
        }
    }

    /// Number of float or int components per element.
    pub const fn components(self) -> usize {
        match self {
            Self::Float2 | Self::Float2Array => 2,
            Self::Float3 | Self::Float3Array => 3,
            Self::Float4 => 4,
            Self::Transform | Self::TransformArray => 12,
            _ => 1,
        }
    }
}

impl fmt::Display for SocketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Socket behaviour flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SocketFlags(u32);

impl SocketFlags {
    pub const NONE: Self = Self(0);
    /// Can be driven by a link.
    pub const LINKABLE: Self = Self(1 << 0);
    /// Runtime-only state; never serialized.
    pub const INTERNAL: Self = Self(1 << 1);
    /// Defaults to the shading normal when unlinked.
    pub const LINK_NORMAL: Self = Self(1 << 2);
    /// Defaults to texture coordinates when unlinked.
    pub const LINK_TEXTURE: Self = Self(1 << 3);

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for SocketFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

/// Name/id table of an enum socket.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnumDef {
    entries: Vec<(String, i32)>,
}

impl EnumDef {
    /// Build from `(name, id)` pairs.
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, i32)>) -> Self {
        Self {
            entries: entries.into_iter().map(|(n, v)| (n.to_string(), v)).collect(),
        }
    }

    /// Build with ids assigned in declaration order.
    pub fn sequential<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            entries: names.into_iter().enumerate().map(|(i, n)| (n.to_string(), i as i32)).collect(),
        }
    }

    pub fn id_of(&self, name: &str) -> Option<i32> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn name_of(&self, id: i32) -> Option<&str> {
        self.entries.iter().find(|(_, v)| *v == id).map(|(n, _)| n.as_str())
    }

    pub fn contains_id(&self, id: i32) -> bool {
        self.entries.iter().any(|(_, v)| *v == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }
}

/// One declared socket on a node type.
#[derive(Clone, Debug)]
pub struct SocketDef {
    /// Stable identifier used in the index and for link matching.
    pub name: String,
    /// Human-facing alias.
    pub ui_name: String,
    pub ty: SocketType,
    pub default: SocketValue,
    pub flags: SocketFlags,
    pub enum_def: Option<Arc<EnumDef>>,
}

impl SocketDef {
    pub fn new(name: &str, ui_name: &str, ty: SocketType, default: SocketValue) -> Self {
        Self {
            name: name.to_string(),
            ui_name: ui_name.to_string(),
            ty,
            default,
            flags: SocketFlags::NONE,
            enum_def: None,
        }
    }

    pub fn with_flags(mut self, flags: SocketFlags) -> Self {
        self.flags = self.flags | flags;
        self
    }

    pub fn with_enum(mut self, def: EnumDef) -> Self {
        self.enum_def = Some(Arc::new(def));
        self
    }

    #[inline]
    pub fn is_internal(&self) -> bool {
        self.flags.contains(SocketFlags::INTERNAL)
    }

    /// Name-first, alias-fallback match against an optional name and alias.
    pub fn matches(&self, name: Option<&str>, alias: Option<&str>) -> bool {
        name.is_some_and(|n| n == self.name) || alias.is_some_and(|a| a == self.ui_name)
    }
}

/// Find a socket: name match wins over alias match anywhere in the list.
pub fn find_socket(defs: &[SocketDef], name: Option<&str>, alias: Option<&str>) -> Option<usize> {
    if let Some(n) = name.filter(|n| !n.is_empty()) {
        if let Some(i) = defs.iter().position(|d| d.name == n) {
            return Some(i);
        }
    }
    let alias = alias.filter(|a| !a.is_empty())?;
    defs.iter().position(|d| d.ui_name == alias)
}
