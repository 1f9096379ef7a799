//! Node types and node instances.

use std::fmt;
use std::sync::Arc;

use super::socket::{find_socket, EnumDef, SocketDef, SocketFlags, SocketType};
use super::value::SocketValue;
use crate::util::{Error, Result, Transform, Vec2, Vec3, Vec4};

/// Stable index of a node inside one arena (scene or shader graph).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node type is used for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeCategory {
    /// Node living inside a shader graph.
    Shader,
    /// The terminal node of a shader graph.
    ShaderOutput,
    /// Scene-level node: camera, film, geometry, object, ...
    Scene,
}

/// Declared layout of a node kind.
#[derive(Debug)]
pub struct NodeType {
    pub name: String,
    pub category: NodeCategory,
    /// Abstract types cannot be instantiated from an index.
    pub is_abstract: bool,
    pub inputs: Vec<SocketDef>,
    pub outputs: Vec<SocketDef>,
}

impl NodeType {
    pub fn find_input(&self, name: Option<&str>, alias: Option<&str>) -> Option<usize> {
        find_socket(&self.inputs, name, alias)
    }

    pub fn find_output(&self, name: Option<&str>, alias: Option<&str>) -> Option<usize> {
        find_socket(&self.outputs, name, alias)
    }

    /// Input index by exact stable name.
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|s| s.name == name)
    }
}

/// Builder for [`NodeType`].
pub struct NodeTypeBuilder {
    ty: NodeType,
}

impl NodeTypeBuilder {
    pub fn new(name: &str, category: NodeCategory) -> Self {
        Self {
            ty: NodeType {
                name: name.to_string(),
                category,
                is_abstract: false,
                inputs: Vec::new(),
                outputs: Vec::new(),
            },
        }
    }

    pub fn shader(name: &str) -> Self {
        Self::new(name, NodeCategory::Shader)
    }

    pub fn scene(name: &str) -> Self {
        Self::new(name, NodeCategory::Scene)
    }

    pub fn abstract_type(mut self) -> Self {
        self.ty.is_abstract = true;
        self
    }

    pub fn socket(mut self, def: SocketDef) -> Self {
        self.ty.inputs.push(def);
        self
    }

    fn input(self, name: &str, ui: &str, ty: SocketType, default: SocketValue) -> Self {
        let flags = if self.ty.category == NodeCategory::Scene {
            SocketFlags::NONE
        } else {
            SocketFlags::LINKABLE
        };
        self.socket(SocketDef::new(name, ui, ty, default).with_flags(flags))
    }

    pub fn boolean(self, name: &str, ui: &str, v: bool) -> Self {
        self.input(name, ui, SocketType::Boolean, SocketValue::Bool(v))
    }

    pub fn int(self, name: &str, ui: &str, v: i32) -> Self {
        self.input(name, ui, SocketType::Int, SocketValue::Int(v))
    }

    pub fn int64(self, name: &str, ui: &str, v: i64) -> Self {
        self.input(name, ui, SocketType::Int64, SocketValue::Int64(v))
    }

    pub fn uint(self, name: &str, ui: &str, v: u32) -> Self {
        self.input(name, ui, SocketType::UInt, SocketValue::UInt(v))
    }

    pub fn float(self, name: &str, ui: &str, v: f32) -> Self {
        self.input(name, ui, SocketType::Float, SocketValue::Float(v))
    }

    pub fn float2(self, name: &str, ui: &str, v: Vec2) -> Self {
        self.input(name, ui, SocketType::Float2, SocketValue::Float2(v))
    }

    pub fn float3(self, name: &str, ui: &str, v: Vec3) -> Self {
        self.input(name, ui, SocketType::Float3, SocketValue::Float3(v))
    }

    pub fn float4(self, name: &str, ui: &str, v: Vec4) -> Self {
        self.input(name, ui, SocketType::Float4, SocketValue::Float4(v))
    }

    pub fn transform(self, name: &str, ui: &str, v: Transform) -> Self {
        self.input(name, ui, SocketType::Transform, SocketValue::Transform(v))
    }

    pub fn string(self, name: &str, ui: &str, v: &str) -> Self {
        self.input(name, ui, SocketType::String, SocketValue::String(v.to_string()))
    }

    pub fn enumeration(self, name: &str, ui: &str, def: EnumDef, v: i32) -> Self {
        self.socket(SocketDef::new(name, ui, SocketType::Enum, SocketValue::Enum(v)).with_enum(def))
    }

    pub fn node_ref(self, name: &str, ui: &str) -> Self {
        self.input(name, ui, SocketType::Node, SocketValue::Node(None))
    }

    /// Array input with an empty default.
    pub fn array(self, name: &str, ui: &str, ty: SocketType) -> Self {
        debug_assert!(ty.is_array());
        self.input(name, ui, ty, SocketValue::zero(ty))
    }

    /// Closure input (links only).
    pub fn closure(self, name: &str, ui: &str) -> Self {
        self.input(name, ui, SocketType::Closure, SocketValue::Closure)
    }

    /// Runtime-only input, never serialized.
    pub fn internal(self, name: &str, ty: SocketType) -> Self {
        self.socket(SocketDef::new(name, name, ty, SocketValue::zero(ty)).with_flags(SocketFlags::INTERNAL))
    }

    pub fn output(mut self, name: &str, ui: &str, ty: SocketType) -> Self {
        self.ty.outputs.push(SocketDef::new(name, ui, ty, SocketValue::zero(ty)));
        self
    }

    pub fn build(self) -> Arc<NodeType> {
        Arc::new(self.ty)
    }
}

/// Image bytes carried inline with a texture node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EmbeddedImage {
    pub data: Vec<u8>,
    pub channels: u32,
    pub width: u32,
    pub height: u32,
    /// Pixel storage name, e.g. `byte4`, `half4`, `float4`.
    pub data_type: String,
    pub colorspace: String,
}

/// An instance of a node type.
#[derive(Clone, Debug)]
pub struct Node {
    ty: Arc<NodeType>,
    pub name: String,
    values: Vec<SocketValue>,
    pub image: Option<EmbeddedImage>,
}

impl Node {
    /// New node with every input at its declared default.
    pub fn new(ty: Arc<NodeType>) -> Self {
        let values = ty.inputs.iter().map(|s| s.default.clone()).collect();
        Self {
            ty,
            name: String::new(),
            values,
            image: None,
        }
    }

    #[inline]
    pub fn node_type(&self) -> &Arc<NodeType> {
        &self.ty
    }

    #[inline]
    pub fn type_name(&self) -> &str {
        &self.ty.name
    }

    /// Value of input `index`.
    #[inline]
    pub fn value(&self, index: usize) -> &SocketValue {
        &self.values[index]
    }

    /// Value of input by stable name.
    pub fn get(&self, name: &str) -> Option<&SocketValue> {
        self.ty.input_index(name).map(|i| &self.values[i])
    }

    /// True if input `index` still holds its declared default.
    pub fn is_default(&self, index: usize) -> bool {
        self.values[index] == self.ty.inputs[index].default
    }

    /// Set input `index`, checking the value type against the declaration.
    pub fn set_value(&mut self, index: usize, value: SocketValue) -> Result<()> {
        let def = self
            .ty
            .inputs
            .get(index)
            .ok_or_else(|| Error::invalid(format!("{}: no input #{index}", self.ty.name)))?;
        let actual = value.socket_type();
        if actual != def.ty {
            return Err(Error::TypeMismatch {
                expected: def.ty.to_string(),
                actual: actual.to_string(),
            });
        }
        self.values[index] = value;
        Ok(())
    }

    /// Set input by stable name.
    pub fn set(&mut self, name: &str, value: SocketValue) -> Result<()> {
        let index = self
            .ty
            .input_index(name)
            .ok_or_else(|| Error::invalid(format!("{}: no input '{name}'", self.ty.name)))?;
        self.set_value(index, value)
    }

    /// Builder-style [`set`](Self::set) for fixtures and tests.
    pub fn with(mut self, name: &str, value: SocketValue) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    pub fn values(&self) -> &[SocketValue] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_type() -> Arc<NodeType> {
        NodeTypeBuilder::shader("emission")
            .float3("color", "Color", Vec3::ONE)
            .float("strength", "Strength", 1.0)
            .output("emission", "Emission", SocketType::Closure)
            .build()
    }

    #[test]
    fn test_defaults_and_set() {
        let mut node = Node::new(sample_type());
        assert!(node.is_default(0));
        node.set("strength", SocketValue::Float(4.0)).unwrap();
        assert!(!node.is_default(1));
        assert_eq!(node.get("strength").and_then(|v| v.as_float()), Some(4.0));
    }

    #[test]
    fn test_set_rejects_wrong_type() {
        let mut node = Node::new(sample_type());
        let err = node.set("strength", SocketValue::Int(1)).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert!(node.set("nope", SocketValue::Float(1.0)).is_err());
    }

    #[test]
    fn test_scene_inputs_not_linkable() {
        let ty = NodeTypeBuilder::scene("film").float("exposure", "Exposure", 1.0).build();
        assert!(!ty.inputs[0].flags.contains(SocketFlags::LINKABLE));
        assert!(sample_type().inputs[0].flags.contains(SocketFlags::LINKABLE));
    }
}
