//! Node type registry: type name to declaration plus factory.
//!
//! The decoder never reflects over type names; it looks the tag up here and
//! calls the registered factory. Unknown names are reported by the caller.

use std::collections::HashMap;
use std::sync::Arc;

use super::builtin;
use super::node::{Node, NodeCategory, NodeType};
use crate::util::{Error, Result};

/// Constructor for a registered node type.
pub type NodeFactory = fn(Arc<NodeType>) -> Node;

struct Entry {
    ty: Arc<NodeType>,
    factory: NodeFactory,
}

/// Registry of known node types.
pub struct NodeRegistry {
    entries: HashMap<String, Entry>,
}

impl NodeRegistry {
    /// Empty registry.
    pub fn empty() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Registry pre-populated with the built-in shader and scene node types.
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        builtin::register_all(&mut reg);
        reg
    }

    /// Register a type with the default factory. Replaces any earlier entry.
    pub fn register(&mut self, ty: Arc<NodeType>) {
        self.register_with(ty, Node::new);
    }

    /// Register a type with a custom factory.
    pub fn register_with(&mut self, ty: Arc<NodeType>, factory: NodeFactory) {
        self.entries.insert(ty.name.clone(), Entry { ty, factory });
    }

    pub fn get(&self, name: &str) -> Option<&Arc<NodeType>> {
        self.entries.get(name).map(|e| &e.ty)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Instantiate a node of the named type.
    pub fn create(&self, name: &str) -> Result<Node> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| Error::UnknownNodeType(name.to_string()))?;
        if entry.ty.is_abstract {
            return Err(Error::invalid(format!("node type '{name}' is abstract")));
        }
        Ok((entry.factory)(entry.ty.clone()))
    }

    /// Instantiate a shader-graph node; rejects scene types.
    pub fn create_shader_node(&self, name: &str) -> Result<Node> {
        let ty = self.get(name).ok_or_else(|| Error::UnknownNodeType(name.to_string()))?;
        if ty.category != NodeCategory::Shader {
            return Err(Error::invalid(format!("'{name}' is not a shader node")));
        }
        self.create(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::node::NodeTypeBuilder;
    use crate::graph::value::SocketValue;

    #[test]
    fn test_builtins_present() {
        let reg = NodeRegistry::with_builtins();
        for name in ["principled_bsdf", "image_texture", "output", "camera", "mesh", "object"] {
            assert!(reg.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_create_unknown_and_abstract() {
        let mut reg = NodeRegistry::empty();
        assert!(matches!(reg.create("nope"), Err(Error::UnknownNodeType(_))));

        reg.register(NodeTypeBuilder::shader("base").abstract_type().build());
        assert!(reg.create("base").is_err());
    }

    #[test]
    fn test_shader_node_category_checked() {
        let reg = NodeRegistry::with_builtins();
        assert!(reg.create_shader_node("emission").is_ok());
        assert!(reg.create_shader_node("camera").is_err());
        assert!(reg.create_shader_node("output").is_err());
    }

    #[test]
    fn test_custom_factory() {
        fn bright(ty: Arc<NodeType>) -> Node {
            let mut n = Node::new(ty);
            n.name = "bright".into();
            n
        }
        let mut reg = NodeRegistry::empty();
        reg.register_with(
            NodeTypeBuilder::shader("value").float("value", "Value", 0.0).build(),
            bright,
        );
        let n = reg.create("value").unwrap();
        assert_eq!(n.name, "bright");
        assert_eq!(n.value(0), &SocketValue::Float(0.0));
    }
}
