//! Socket values.

use smallvec::SmallVec;

use super::node::NodeId;
use super::socket::SocketType;
use crate::util::{Transform, Vec2, Vec3, Vec4};

/// Inline storage for node-array values; most arrays hold one or two shaders.
pub type NodeList = SmallVec<[NodeId; 4]>;

/// Value held by a node input.
#[derive(Clone, Debug, PartialEq)]
pub enum SocketValue {
    Bool(bool),
    Int(i32),
    Int64(i64),
    UInt(u32),
    Float(f32),
    Float2(Vec2),
    Float3(Vec3),
    Float4(Vec4),
    Transform(Transform),
    Enum(i32),
    String(String),
    Node(Option<NodeId>),
    Closure,
    BoolArray(Vec<bool>),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
    Float2Array(Vec<Vec2>),
    Float3Array(Vec<Vec3>),
    TransformArray(Vec<Transform>),
    StringArray(Vec<String>),
    NodeArray(NodeList),
}

impl SocketValue {
    /// Zero value for a declared type.
    pub fn zero(ty: SocketType) -> Self {
        match ty {
            SocketType::Boolean => Self::Bool(false),
            SocketType::Int => Self::Int(0),
            SocketType::Int64 => Self::Int64(0),
            SocketType::UInt => Self::UInt(0),
            SocketType::Float => Self::Float(0.0),
            SocketType::Float2 => Self::Float2(Vec2::ZERO),
            SocketType::Float3 => Self::Float3(Vec3::ZERO),
            SocketType::Float4 => Self::Float4(Vec4::ZERO),
            SocketType::Transform => Self::Transform(Transform::IDENTITY),
            SocketType::Enum => Self::Enum(0),
            SocketType::String => Self::String(String::new()),
            SocketType::Node => Self::Node(None),
            SocketType::Closure => Self::Closure,
            SocketType::BooleanArray => Self::BoolArray(Vec::new()),
            SocketType::IntArray => Self::IntArray(Vec::new()),
            SocketType::FloatArray => Self::FloatArray(Vec::new()),
            SocketType::Float2Array => Self::Float2Array(Vec::new()),
            SocketType::Float3Array => Self::Float3Array(Vec::new()),
            SocketType::TransformArray => Self::TransformArray(Vec::new()),
            SocketType::StringArray => Self::StringArray(Vec::new()),
            SocketType::NodeArray => Self::NodeArray(NodeList::new()),
        }
    }

    /// Type this value would satisfy.
    pub fn socket_type(&self) -> SocketType {
        match self {
            Self::Bool(_) => SocketType::Boolean,
            Self::Int(_) => SocketType::Int,
            Self::Int64(_) => SocketType::Int64,
            Self::UInt(_) => SocketType::UInt,
            Self::Float(_) => SocketType::Float,
            Self::Float2(_) => SocketType::Float2,
            Self::Float3(_) => SocketType::Float3,
            Self::Float4(_) => SocketType::Float4,
            Self::Transform(_) => SocketType::Transform,
            Self::Enum(_) => SocketType::Enum,
            Self::String(_) => SocketType::String,
            Self::Node(_) => SocketType::Node,
            Self::Closure => SocketType::Closure,
            Self::BoolArray(_) => SocketType::BooleanArray,
            Self::IntArray(_) => SocketType::IntArray,
            Self::FloatArray(_) => SocketType::FloatArray,
            Self::Float2Array(_) => SocketType::Float2Array,
            Self::Float3Array(_) => SocketType::Float3Array,
            Self::TransformArray(_) => SocketType::TransformArray,
            Self::StringArray(_) => SocketType::StringArray,
            Self::NodeArray(_) => SocketType::NodeArray,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) | Self::Enum(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float3(&self) -> Option<Vec3> {
        match self {
            Self::Float3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_transform(&self) -> Option<&Transform> {
        match self {
            Self::Transform(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(v) => *v,
            _ => None,
        }
    }

    pub fn as_node_list(&self) -> Option<&[NodeId]> {
        match self {
            Self::NodeArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float3_array(&self) -> Option<&[Vec3]> {
        match self {
            Self::Float3Array(v) => Some(v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_matches_type() {
        for ty in [
            SocketType::Boolean,
            SocketType::Int64,
            SocketType::Float4,
            SocketType::TransformArray,
            SocketType::NodeArray,
            SocketType::Closure,
        ] {
            assert_eq!(SocketValue::zero(ty).socket_type(), ty);
        }
    }

    #[test]
    fn test_accessors() {
        assert_eq!(SocketValue::Enum(3).as_int(), Some(3));
        assert_eq!(SocketValue::Float(1.5).as_float(), Some(1.5));
        assert_eq!(SocketValue::Node(Some(NodeId(2))).as_node(), Some(NodeId(2)));
        assert_eq!(SocketValue::Node(None).as_node(), None);
        assert!(SocketValue::Int(1).as_str().is_none());
    }
}
