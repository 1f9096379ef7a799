//! Scene to index + blob.
//!
//! Every non-default, non-internal socket becomes a `socket` child carrying
//! `name`, `ui_name`, `value` and `type_name`. Numeric arrays go to the blob
//! when one is attached, otherwise they are written inline. Node references
//! are written as the referenced node's index name.

use std::collections::HashMap;
use std::path::Path;

use super::blob::BlobWriter;
use super::format::{
    attr, blob_path, ATTRIBUTE_TAG, BACKGROUND_SHADER_TAG, BACKGROUND_SHADER_TYPE, CONNECT_TAG,
    ROOT_TAG, SOCKET_TAG,
};
use super::index::Element;
use super::text::to_text;
use crate::graph::{Node, NodeId, ShaderGraph, SocketType, SocketValue, OUTPUT_NODE};
use crate::scene::{
    Attribute, AttributeData, ObjectAttribute, Scene, SceneExtra, SceneNode, TypeDesc,
    PRESERVED_SHADER_NAMES,
};
use crate::util::{Error, Result};
use crate::volume::VoxelPayload;

/// Node types whose image bytes are embedded in the blob.
pub const EMBEDDED_IMAGE_TYPES: [&str; 2] = ["image_texture", "environment_texture"];

/// Arena a node id belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NameScope {
    Scene,
    /// Graph of the given scene shader.
    Graph(NodeId),
}

/// Assigns index names for one encode pass.
///
/// Preserved default-shader names are kept verbatim. Everything else gets a
/// synthetic `<type>_<n>` name, stable for the pass and unique across scopes.
#[derive(Debug, Default)]
pub struct NameAllocator {
    assigned: HashMap<(NameScope, NodeId), String>,
    next: u32,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name_for(&mut self, scope: NameScope, id: NodeId, node: &Node) -> String {
        if is_preserved(&node.name) {
            return node.name.clone();
        }
        let next = &mut self.next;
        self.assigned
            .entry((scope, id))
            .or_insert_with(|| {
                *next += 1;
                format!("{}_{}", node.type_name(), next)
            })
            .clone()
    }
}

pub(crate) fn is_preserved(name: &str) -> bool {
    PRESERVED_SHADER_NAMES.contains(&name)
}

/// Encoder state for one pass.
pub struct Encoder<'b> {
    names: NameAllocator,
    blob: Option<&'b mut BlobWriter>,
}

impl<'b> Encoder<'b> {
    /// Encoder writing large values to `blob`, or inline when `None`.
    pub fn new(blob: Option<&'b mut BlobWriter>) -> Self {
        Self { names: NameAllocator::new(), blob }
    }

    /// Encode the whole scene under a `cycles` root.
    pub fn encode_scene(&mut self, scene: &Scene) -> Result<Element> {
        let mut root = Element::new(ROOT_TAG);

        for id in scene.shaders() {
            root.push(self.encode_shader(scene, id)?);
        }

        let singletons = [
            (scene.camera, "camera"),
            (scene.dicing_camera, "dicing_camera"),
            (scene.film, "film"),
            (scene.background, "background"),
            (scene.integrator, "integrator"),
        ];
        for (id, name) in singletons {
            let mut elem = self.encode_scene_node(scene, id)?;
            elem.set_attr(attr::NAME, name);
            root.push(elem);
        }

        for ty in ["pass", "particle_system"] {
            for id in scene.nodes_of_type(ty) {
                root.push(self.encode_scene_node(scene, id)?);
            }
        }
        for id in scene.geometry() {
            root.push(self.encode_geometry(scene, id)?);
        }
        for id in scene.objects() {
            root.push(self.encode_object(scene, id)?);
        }
        Ok(root)
    }

    fn scene_node<'s>(scene: &'s Scene, id: NodeId) -> Result<&'s SceneNode> {
        scene
            .get(id)
            .ok_or_else(|| Error::invalid(format!("scene node {id} does not exist")))
    }

    fn encode_scene_node(&mut self, scene: &Scene, id: NodeId) -> Result<Element> {
        let sn = Self::scene_node(scene, id)?;
        self.encode_node(Some(scene), NameScope::Scene, id, &sn.node, sn.node.type_name())
    }

    /// Shader element: the shader's sockets, its graph nodes and `connect` records.
    pub fn encode_shader(&mut self, scene: &Scene, id: NodeId) -> Result<Element> {
        let sn = Self::scene_node(scene, id)?;
        let mut elem = self.encode_node(Some(scene), NameScope::Scene, id, &sn.node, "shader")?;
        if let Some(graph) = sn.graph() {
            self.encode_graph(&mut elem, id, graph)?;
        }
        Ok(elem)
    }

    fn encode_graph(&mut self, elem: &mut Element, shader: NodeId, graph: &ShaderGraph) -> Result<()> {
        let scope = NameScope::Graph(shader);
        let output = graph.output();

        for (gid, node) in graph.nodes() {
            if gid == output {
                continue;
            }
            let tag = match node.type_name() {
                BACKGROUND_SHADER_TYPE => BACKGROUND_SHADER_TAG,
                other => other,
            };
            let mut child = self.encode_node(None, scope, gid, node, tag)?;
            if EMBEDDED_IMAGE_TYPES.contains(&node.type_name()) {
                self.embed_image(&mut child, node)?;
            }
            elem.push(child);
        }

        for link in graph.links() {
            let (Some(from), Some(to)) = (graph.node(link.from), graph.node(link.to)) else {
                continue;
            };
            let out = &from.node_type().outputs[link.from_socket];
            let inp = &to.node_type().inputs[link.to_socket];
            let to_name = if link.to == output {
                OUTPUT_NODE.to_string()
            } else {
                self.names.name_for(scope, link.to, to)
            };
            let connect = Element::new(CONNECT_TAG)
                .with_attr(attr::FROM_NODE, self.names.name_for(scope, link.from, from))
                .with_attr(attr::FROM_SOCKET, out.name.as_str())
                .with_attr(attr::FROM_SOCKET_UI, out.ui_name.as_str())
                .with_attr(attr::TO_NODE, to_name)
                .with_attr(attr::TO_SOCKET, inp.name.as_str())
                .with_attr(attr::TO_SOCKET_UI, inp.ui_name.as_str());
            elem.push(connect);
        }
        Ok(())
    }

    fn embed_image(&mut self, elem: &mut Element, node: &Node) -> Result<()> {
        let Some(image) = node.image.as_ref() else {
            return Ok(());
        };
        let Some(blob) = self.blob.as_deref_mut() else {
            tracing::warn!(node = %node.name, "no blob attached, embedded image dropped");
            return Ok(());
        };
        let offset = blob.write_bytes(&image.data)?.to_string();

        let existing = elem
            .children
            .iter_mut()
            .find(|c| c.tag == SOCKET_TAG && c.attr(attr::NAME) == Some("filename"));
        match existing {
            Some(socket) => socket.set_attr(attr::VALUE, offset),
            None => elem.push(
                Element::new(SOCKET_TAG)
                    .with_attr(attr::NAME, "filename")
                    .with_attr(attr::UI_NAME, "Filename")
                    .with_attr(attr::VALUE, offset)
                    .with_attr(attr::TYPE_NAME, SocketType::String.name()),
            ),
        }
        elem.set_attr(attr::CHANNELS, image.channels.to_string());
        elem.set_attr(attr::WIDTH, image.width.to_string());
        elem.set_attr(attr::HEIGHT, image.height.to_string());
        elem.set_attr(attr::TYPE, image.data_type.as_str());
        elem.set_attr(attr::COLORSPACE, image.colorspace.as_str());
        Ok(())
    }

    fn encode_geometry(&mut self, scene: &Scene, id: NodeId) -> Result<Element> {
        let sn = Self::scene_node(scene, id)?;
        let mut elem = self.encode_node(Some(scene), NameScope::Scene, id, &sn.node, sn.node.type_name())?;
        if let Some(kind) = sn.geometry_kind() {
            elem.set_attr(attr::GEOMETRY_TYPE, (kind as i32).to_string());
        }
        for attribute in sn.attributes() {
            elem.push(self.encode_attribute(attribute)?);
        }
        Ok(elem)
    }

    fn encode_attribute(&mut self, a: &Attribute) -> Result<Element> {
        let mut elem = Element::new(ATTRIBUTE_TAG).with_attr(attr::NAME, a.name.as_str());
        elem.set_attr(attr::STD, a.std.to_string());
        write_type_desc(&mut elem, &a.type_desc);
        elem.set_attr(attr::ELEMENT, a.element.to_string());
        elem.set_attr(attr::FLAGS, a.flags.to_string());

        let bytes = match &a.data {
            AttributeData::Empty => return Ok(elem),
            AttributeData::Buffer(data) => data.as_slice(),
            AttributeData::Voxel(payload) => {
                elem.set_attr(attr::VOLUME_TYPE, payload.discriminator());
                if let VoxelPayload::Dense(grid) = payload {
                    let [dx, dy, dz] = grid.dims;
                    let [sx, sy, sz] = grid.scale;
                    elem.set_attr(attr::RAW_DX, dx.to_string());
                    elem.set_attr(attr::RAW_DY, dy.to_string());
                    elem.set_attr(attr::RAW_DZ, dz.to_string());
                    elem.set_attr(attr::SCAL_X, sx.to_string());
                    elem.set_attr(attr::SCAL_Y, sy.to_string());
                    elem.set_attr(attr::SCAL_Z, sz.to_string());
                    elem.set_attr(attr::RAW_TYPE, grid.kind.name());
                    elem.set_attr(attr::RAW_CHANNELS, grid.channels.to_string());
                }
                payload.bytes()
            }
        };
        match self.blob.as_deref_mut() {
            Some(blob) => elem.set_attr(attr::BUFFER, blob.write_bytes(bytes)?.to_string()),
            None => tracing::warn!(attribute = %a.name, "no blob attached, attribute data dropped"),
        }
        Ok(elem)
    }

    fn encode_object(&mut self, scene: &Scene, id: NodeId) -> Result<Element> {
        let sn = Self::scene_node(scene, id)?;
        let mut elem = self.encode_node(Some(scene), NameScope::Scene, id, &sn.node, sn.node.type_name())?;
        for a in sn.object_attributes() {
            elem.push(self.encode_object_attribute(a)?);
        }
        Ok(elem)
    }

    fn encode_object_attribute(&mut self, a: &ObjectAttribute) -> Result<Element> {
        let mut elem = Element::new(ATTRIBUTE_TAG).with_attr(attr::NAME, a.name.as_str());
        write_type_desc(&mut elem, &a.type_desc);
        match self.blob.as_deref_mut() {
            Some(blob) => elem.set_attr(attr::DATA, blob.write_bytes(&a.data)?.to_string()),
            None => tracing::warn!(attribute = %a.name, "no blob attached, object attribute data dropped"),
        }
        elem.set_attr(attr::INTERP, a.interp.to_string());
        Ok(elem)
    }

    /// One node element with its socket children.
    fn encode_node(
        &mut self,
        scene: Option<&Scene>,
        scope: NameScope,
        id: NodeId,
        node: &Node,
        tag: &str,
    ) -> Result<Element> {
        let mut elem = Element::new(tag)
            .with_attr(attr::NAME, self.names.name_for(scope, id, node))
            .with_attr(attr::UI_NAME, node.name.as_str());

        let ty = node.node_type().clone();
        for (i, def) in ty.inputs.iter().enumerate() {
            if def.is_internal() || def.ty == SocketType::Closure || node.is_default(i) {
                continue;
            }
            let value = node.value(i);
            let text = match value {
                SocketValue::Node(target) => match (target, scene) {
                    (Some(t), Some(s)) => self.scene_ref_name(s, *t),
                    _ => None,
                },
                SocketValue::NodeArray(targets) => scene.map(|s| {
                    targets
                        .iter()
                        .filter_map(|t| self.scene_ref_name(s, *t))
                        .collect::<Vec<_>>()
                        .join(" ")
                }),
                v if def.ty.is_numeric_array() && self.blob.is_some() => match self.blob.as_deref_mut() {
                    Some(blob) => Some(blob.write_array(v)?.to_string()),
                    None => None,
                },
                v => to_text(v, def),
            };
            let Some(text) = text else {
                tracing::debug!(node = %node.name, socket = %def.name, "socket has no serialized form");
                continue;
            };
            elem.push(
                Element::new(SOCKET_TAG)
                    .with_attr(attr::NAME, def.name.as_str())
                    .with_attr(attr::UI_NAME, def.ui_name.as_str())
                    .with_attr(attr::VALUE, text)
                    .with_attr(attr::TYPE_NAME, def.ty.name()),
            );
        }
        Ok(elem)
    }

    fn scene_ref_name(&mut self, scene: &Scene, target: NodeId) -> Option<String> {
        match scene.get(target) {
            Some(sn) => Some(self.names.name_for(NameScope::Scene, target, &sn.node)),
            None => {
                tracing::warn!(%target, "reference to a node outside the scene dropped");
                None
            }
        }
    }
}

fn write_type_desc(elem: &mut Element, t: &TypeDesc) {
    elem.set_attr(attr::BASETYPE, t.basetype.to_string());
    elem.set_attr(attr::AGGREGATE, t.aggregate.to_string());
    elem.set_attr(attr::VECSEMANTICS, t.vecsemantics.to_string());
    elem.set_attr(attr::RESERVED, t.reserved.to_string());
    elem.set_attr(attr::ARRAYLEN, t.arraylen.to_string());
}

/// Write `path` (index) and `path.bin` (blob).
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn write_scene(scene: &Scene, path: &Path) -> Result<()> {
    let mut blob = BlobWriter::create(blob_path(path))?;
    let root = Encoder::new(Some(&mut blob)).encode_scene(scene)?;
    blob.flush()?;
    root.write(path)?;
    tracing::info!(nodes = scene.len(), bytes = blob.pos(), "scene written");
    Ok(())
}

/// Encode one shader as a material-edit payload (inline values, no blob).
pub fn encode_shader_payload(scene: &Scene, shader: NodeId) -> Result<Vec<u8>> {
    if !matches!(scene.get(shader).map(|n| &n.extra), Some(SceneExtra::Shader(_))) {
        return Err(Error::invalid(format!("{shader} is not a shader")));
    }
    Encoder::new(None).encode_shader(scene, shader)?.to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeRegistry;
    use crate::scene::GeometryKind;
    use crate::util::Vec3;

    #[test]
    fn test_names_stable_and_preserved() {
        let reg = NodeRegistry::with_builtins();
        let mut names = NameAllocator::new();
        let mut a = reg.create("shader").unwrap();
        a.name = "wood".into();
        let n1 = names.name_for(NameScope::Scene, NodeId(7), &a);
        let n2 = names.name_for(NameScope::Scene, NodeId(7), &a);
        let n3 = names.name_for(NameScope::Graph(NodeId(7)), NodeId(7), &a);
        assert_eq!(n1, n2);
        assert_ne!(n1, n3);

        a.name = "default_surface".into();
        assert_eq!(names.name_for(NameScope::Scene, NodeId(9), &a), "default_surface");
    }

    #[test]
    fn test_defaults_skipped_and_refs_named() {
        let reg = NodeRegistry::with_builtins();
        let mut scene = Scene::new(&reg).unwrap();
        let mesh = reg.create("mesh").unwrap();
        let geom = scene.add(mesh, SceneExtra::Geometry { kind: GeometryKind::Mesh, attributes: vec![] });
        let obj = reg
            .create("object")
            .unwrap()
            .with("geometry", SocketValue::Node(Some(geom)))
            .unwrap();
        scene.add(obj, SceneExtra::Object { attributes: vec![] });

        let root = Encoder::new(None).encode_scene(&scene).unwrap();
        let mesh_elem = root.children_named("mesh").next().unwrap();
        // Only defaults: no socket children.
        assert!(mesh_elem.children.is_empty());
        assert_eq!(mesh_elem.attr(attr::GEOMETRY_TYPE), Some("0"));

        let obj_elem = root.children_named("object").next().unwrap();
        let socket = obj_elem.children_named(SOCKET_TAG).next().unwrap();
        assert_eq!(socket.attr(attr::VALUE), mesh_elem.attr(attr::NAME));
        assert_eq!(socket.attr(attr::TYPE_NAME), Some("node"));
    }

    #[test]
    fn test_arrays_go_to_blob_when_attached() {
        let reg = NodeRegistry::with_builtins();
        let mut scene = Scene::new(&reg).unwrap();
        let mesh = reg
            .create("mesh")
            .unwrap()
            .with("verts", SocketValue::Float3Array(vec![Vec3::ONE, Vec3::ZERO]))
            .unwrap();
        scene.add(mesh, SceneExtra::Geometry { kind: GeometryKind::Mesh, attributes: vec![] });

        let mut blob = BlobWriter::in_memory();
        let root = Encoder::new(Some(&mut blob)).encode_scene(&scene).unwrap();
        let mesh_elem = root.children_named("mesh").next().unwrap();
        let verts = mesh_elem.children_named(SOCKET_TAG).next().unwrap();
        assert_eq!(verts.attr(attr::VALUE), Some("0"));
        assert_eq!(blob.pos(), 8 + 2 * 12);

        let inline = Encoder::new(None).encode_scene(&scene).unwrap();
        let verts = inline.children_named("mesh").next().unwrap().children_named(SOCKET_TAG).next().unwrap();
        assert_eq!(verts.attr(attr::VALUE), Some("1 1 1 0 0 0"));
    }

    #[test]
    fn test_shader_connects_use_output_name() {
        let reg = NodeRegistry::with_builtins();
        let scene = Scene::new(&reg).unwrap();
        let id = scene.find_shader("default_surface").unwrap();
        let elem = Encoder::new(None).encode_shader(&scene, id).unwrap();
        assert_eq!(elem.tag, "shader");
        assert_eq!(elem.attr(attr::NAME), Some("default_surface"));
        let connect = elem.children_named(CONNECT_TAG).next().unwrap();
        assert_eq!(connect.attr(attr::TO_NODE), Some(OUTPUT_NODE));
        assert_eq!(connect.attr(attr::TO_SOCKET), Some("surface"));
        let bsdf = elem.children_named("diffuse_bsdf").next().unwrap();
        assert_eq!(connect.attr(attr::FROM_NODE), bsdf.attr(attr::NAME));
    }

    #[test]
    fn test_payload_rejects_non_shader() {
        let reg = NodeRegistry::with_builtins();
        let scene = Scene::new(&reg).unwrap();
        assert!(encode_shader_payload(&scene, scene.film).is_err());
        let id = scene.find_shader("default_background").unwrap();
        let bytes = encode_shader_payload(&scene, id).unwrap();
        let elem = Element::from_slice(&bytes).unwrap();
        assert!(elem.children_named(BACKGROUND_SHADER_TAG).next().is_some());
    }
}
