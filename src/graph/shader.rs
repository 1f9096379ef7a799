//! Shader graph: an arena of nodes plus `(node, socket)` links.
//!
//! Nodes are never removed, so a [`NodeId`] stays valid for the life of the
//! graph. Each input carries at most one link; connecting an input that is
//! already linked replaces the old link.

use std::sync::Arc;

use super::builtin::OUTPUT_NODE;
use super::node::{Node, NodeId, NodeType};
use super::registry::NodeRegistry;
use crate::util::{Error, Result};

/// Directed edge from an output socket to an input socket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Link {
    pub from: NodeId,
    pub from_socket: usize,
    pub to: NodeId,
    pub to_socket: usize,
}

/// Node graph describing one material.
#[derive(Clone, Debug)]
pub struct ShaderGraph {
    nodes: Vec<Node>,
    links: Vec<Link>,
    output: NodeId,
}

impl ShaderGraph {
    /// New graph holding only the output node.
    pub fn new(registry: &NodeRegistry) -> Result<Self> {
        let ty = registry
            .get(OUTPUT_NODE)
            .ok_or_else(|| Error::UnknownNodeType(OUTPUT_NODE.to_string()))?;
        Ok(Self::with_output_type(ty.clone()))
    }

    /// New graph using an explicit output node type.
    pub fn with_output_type(ty: Arc<NodeType>) -> Self {
        let mut output = Node::new(ty);
        output.name = OUTPUT_NODE.to_string();
        Self {
            nodes: vec![output],
            links: Vec::new(),
            output: NodeId(0),
        }
    }

    #[inline]
    pub fn output(&self) -> NodeId {
        self.output
    }

    /// Add a node and return its id.
    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// All nodes with their ids, output node first.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i as u32), n))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// First node with the given name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes().find(|(_, n)| n.name == name).map(|(id, _)| id)
    }

    /// Link driving the given input, if any.
    pub fn input_link(&self, to: NodeId, to_socket: usize) -> Option<&Link> {
        self.links.iter().find(|l| l.to == to && l.to_socket == to_socket)
    }

    /// Connect `from.outputs[from_socket]` to `to.inputs[to_socket]`.
    ///
    /// Both endpoints must exist; nothing is installed otherwise.
    pub fn connect(&mut self, from: NodeId, from_socket: usize, to: NodeId, to_socket: usize) -> Result<()> {
        let src = self
            .node(from)
            .ok_or_else(|| Error::invalid(format!("link source {from} not in graph")))?;
        if from_socket >= src.node_type().outputs.len() {
            return Err(Error::invalid(format!(
                "{} has no output #{from_socket}",
                src.type_name()
            )));
        }
        let dst = self
            .node(to)
            .ok_or_else(|| Error::invalid(format!("link target {to} not in graph")))?;
        if to_socket >= dst.node_type().inputs.len() {
            return Err(Error::invalid(format!("{} has no input #{to_socket}", dst.type_name())));
        }
        self.links.retain(|l| !(l.to == to && l.to_socket == to_socket));
        self.links.push(Link { from, from_socket, to, to_socket });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_and_replace() {
        let reg = NodeRegistry::with_builtins();
        let mut g = ShaderGraph::new(&reg).unwrap();
        let a = g.add(reg.create("diffuse_bsdf").unwrap());
        let b = g.add(reg.create("emission").unwrap());
        let out = g.output();

        g.connect(a, 0, out, 0).unwrap();
        g.connect(b, 0, out, 0).unwrap();
        assert_eq!(g.links().len(), 1);
        assert_eq!(g.input_link(out, 0).map(|l| l.from), Some(b));
    }

    #[test]
    fn test_connect_rejects_bad_endpoints() {
        let reg = NodeRegistry::with_builtins();
        let mut g = ShaderGraph::new(&reg).unwrap();
        let a = g.add(reg.create("value").unwrap());
        assert!(g.connect(a, 5, g.output(), 0).is_err());
        assert!(g.connect(NodeId(99), 0, g.output(), 0).is_err());
        assert!(g.connect(a, 0, g.output(), 42).is_err());
        assert!(g.links().is_empty());
    }

    #[test]
    fn test_find_by_name() {
        let reg = NodeRegistry::with_builtins();
        let mut g = ShaderGraph::new(&reg).unwrap();
        let mut n = reg.create("value").unwrap();
        n.name = "v1".into();
        let id = g.add(n);
        assert_eq!(g.find("v1"), Some(id));
        assert_eq!(g.find(OUTPUT_NODE), Some(g.output()));
    }
}
