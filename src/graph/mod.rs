//! Typed node model shared by the scene and the wire format.
//!
//! - [`NodeType`] / [`SocketDef`] - declarations
//! - [`Node`] / [`SocketValue`] - instances
//! - [`NodeRegistry`] - type name to factory
//! - [`ShaderGraph`] - arena graph with `(NodeId, socket)` links

mod builtin;
mod node;
mod registry;
mod shader;
mod socket;
mod value;

pub use builtin::OUTPUT_NODE;
pub use node::*;
pub use registry::*;
pub use shader::*;
pub use socket::*;
pub use value::*;
