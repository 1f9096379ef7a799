//! Index + blob to scene.
//!
//! Decoding is tolerant: unknown tags, node types, sockets and enum values
//! are logged and skipped, unresolved references become null, and a link is
//! installed only when both of its endpoints resolve.
//!
//! References are resolved against names decoded so far, so elements must
//! appear in definition order (the order the encoder writes).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::blob::BlobReader;
use super::encode::EMBEDDED_IMAGE_TYPES;
use super::format::{
    attr, blob_path, is_offset, volume_type, ATTRIBUTE_TAG, BACKGROUND_SHADER_TAG,
    BACKGROUND_SHADER_TYPE, CONNECT_TAG, OUTPUT_ALIAS, ROOT_TAG, SOCKET_TAG,
};
use super::index::Element;
use super::text::from_text;
use crate::graph::{
    EmbeddedImage, Node, NodeId, NodeList, NodeRegistry, ShaderGraph, SocketDef, SocketType,
    SocketValue, OUTPUT_NODE,
};
use crate::scene::{
    Attribute, AttributeData, GeometryKind, ObjectAttribute, Scene, SceneExtra, TypeDesc,
    PRESERVED_SHADER_NAMES,
};
use crate::util::{Error, Result};
use crate::volume::{DenseGrid, ScalarKind, VoxelPayload};

const MAX_INCLUDE_DEPTH: usize = 16;

/// Decoder context: node registry, the open blob and the scene name map.
///
/// One decoder serves one scene. It keeps the blob open after the load so
/// later live edits can resolve offsets against the same file.
pub struct SceneDecoder {
    registry: Arc<NodeRegistry>,
    blob: Option<BlobReader>,
    base_dir: PathBuf,
    names: HashMap<String, NodeId>,
}

impl SceneDecoder {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            blob: None,
            base_dir: PathBuf::new(),
            names: HashMap::new(),
        }
    }

    /// Attach a blob for offset-valued sockets.
    pub fn with_blob(mut self, blob: BlobReader) -> Self {
        self.blob = Some(blob);
        self
    }

    /// Directory that relative include and volume paths resolve against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn has_blob(&self) -> bool {
        self.blob.is_some()
    }

    /// Read `path` and its sibling blob into a fresh scene.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub fn load(&mut self, path: &Path) -> Result<Scene> {
        let root = Element::read(path)?;
        self.blob = open_blob(path);
        self.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let scene = self.decode(&root)?;
        tracing::info!(nodes = scene.len(), blob = self.blob.is_some(), "scene loaded");
        Ok(scene)
    }

    /// Decode a root element into a fresh scene.
    pub fn decode(&mut self, root: &Element) -> Result<Scene> {
        let mut scene = Scene::new(&self.registry)?;
        self.decode_into(&mut scene, root);
        Ok(scene)
    }

    /// Decode a root element into an existing scene.
    pub fn decode_into(&mut self, scene: &mut Scene, root: &Element) {
        if root.tag != ROOT_TAG {
            tracing::warn!(tag = %root.tag, "unexpected index root");
        }
        self.names.clear();
        for name in PRESERVED_SHADER_NAMES {
            if let Some(id) = scene.find_shader(name) {
                self.names.insert(name.to_string(), id);
            }
        }
        let base = self.base_dir.clone();
        self.decode_children(scene, root, &base, 0);
    }

    fn decode_children(&mut self, scene: &mut Scene, root: &Element, base: &Path, depth: usize) {
        for child in &root.children {
            let tag = child.tag.to_ascii_lowercase();
            let singleton = match tag.as_str() {
                "film" => Some(scene.film),
                "integrator" => Some(scene.integrator),
                "camera" => Some(scene.camera),
                "dicing_camera" => Some(scene.dicing_camera),
                "background" => Some(scene.background),
                _ => None,
            };
            if let Some(id) = singleton {
                self.read_singleton(scene, id, child);
                continue;
            }
            match tag.as_str() {
                "shader" => self.decode_shader(scene, child),
                "light" | "mesh" | "hair" | "volume" | "pointcloud" => self.decode_geometry(scene, child),
                "particle_system" | "pass" => self.decode_plain(scene, &tag, child),
                "object" => self.decode_object(scene, child),
                "procedural" => tracing::debug!("procedural element ignored"),
                "include" => self.decode_include(scene, child, base, depth),
                _ => tracing::warn!(tag = %child.tag, "unknown scene element"),
            }
        }
    }

    fn decode_include(&mut self, scene: &mut Scene, elem: &Element, base: &Path, depth: usize) {
        let Some(src) = elem.attr(attr::SRC) else {
            tracing::warn!("include without src");
            return;
        };
        if depth >= MAX_INCLUDE_DEPTH {
            tracing::warn!(src, "include nesting too deep");
            return;
        }
        let path = base.join(src);
        let root = match Element::read(&path) {
            Ok(root) => root,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "include skipped");
                return;
            }
        };
        let saved = std::mem::replace(&mut self.blob, open_blob(&path));
        let inc_base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        self.decode_children(scene, &root, &inc_base, depth + 1);
        self.blob = saved;
    }

    fn register(&mut self, elem: &Element, id: NodeId) {
        if let Some(name) = elem.attr(attr::NAME).filter(|n| !n.is_empty()) {
            self.names.insert(name.to_string(), id);
        }
    }

    fn read_singleton(&mut self, scene: &mut Scene, id: NodeId, elem: &Element) {
        let Self { names, blob, .. } = self;
        if let Some(sn) = scene.get_mut(id) {
            read_node(&mut sn.node, elem, names, blob.as_mut());
        }
        self.register(elem, id);
    }

    fn decode_plain(&mut self, scene: &mut Scene, type_name: &str, elem: &Element) {
        let mut node = match self.registry.create(type_name) {
            Ok(node) => node,
            Err(e) => {
                tracing::warn!(error = %e, "element skipped");
                return;
            }
        };
        read_node(&mut node, elem, &self.names, self.blob.as_mut());
        let id = scene.add(node, SceneExtra::None);
        self.register(elem, id);
    }

    fn decode_shader(&mut self, scene: &mut Scene, elem: &Element) {
        let preserved = elem.attr(attr::NAME).and_then(|name| {
            PRESERVED_SHADER_NAMES
                .iter()
                .find(|p| p.eq_ignore_ascii_case(name))
                .and_then(|p| scene.find_shader(p))
        });
        let id = match preserved {
            Some(id) => id,
            None => match self.new_shader() {
                Ok((node, graph)) => scene.add(node, SceneExtra::Shader(graph)),
                Err(e) => {
                    tracing::warn!(error = %e, "shader skipped");
                    return;
                }
            },
        };
        if let Err(e) = self.decode_shader_into(scene, id, elem) {
            tracing::warn!(error = %e, "shader graph not applied");
        }
        self.register(elem, id);
    }

    fn new_shader(&self) -> Result<(Node, ShaderGraph)> {
        Ok((self.registry.create("shader")?, ShaderGraph::new(&self.registry)?))
    }

    /// Read a shader element's sockets into `shader` and replace its graph.
    pub fn decode_shader_into(&mut self, scene: &mut Scene, shader: NodeId, elem: &Element) -> Result<()> {
        let sn = scene
            .get_mut(shader)
            .ok_or_else(|| Error::invalid(format!("shader {shader} does not exist")))?;
        read_node(&mut sn.node, elem, &self.names, self.blob.as_mut());
        let graph = self.decode_graph(elem)?;
        scene.set_graph(shader, graph)
    }

    /// Graph nodes first, then the connect pass.
    pub fn decode_graph(&mut self, elem: &Element) -> Result<ShaderGraph> {
        let mut graph = ShaderGraph::new(&self.registry)?;
        let output = graph.output();
        let mut local: HashMap<String, NodeId> = HashMap::new();
        local.insert(OUTPUT_NODE.to_string(), output);
        local.insert(OUTPUT_ALIAS.to_string(), output);

        let mut connects = Vec::new();
        for child in &elem.children {
            match child.tag.as_str() {
                SOCKET_TAG => continue,
                CONNECT_TAG => connects.push(child),
                tag => {
                    let type_name = if tag == BACKGROUND_SHADER_TAG { BACKGROUND_SHADER_TYPE } else { tag };
                    let mut node = match self.registry.create_shader_node(type_name) {
                        Ok(node) => node,
                        Err(e) => {
                            tracing::warn!(tag, error = %e, "shader node skipped");
                            continue;
                        }
                    };
                    read_node(&mut node, child, &local, self.blob.as_mut());
                    if EMBEDDED_IMAGE_TYPES.contains(&type_name) {
                        self.read_embedded_image(&mut node, child);
                    }
                    let id = graph.add(node);
                    if let Some(name) = child.attr(attr::NAME).filter(|n| !n.is_empty()) {
                        local.insert(name.to_string(), id);
                    }
                }
            }
        }

        let mut installed = 0;
        for c in &connects {
            if connect(&mut graph, &local, c) {
                installed += 1;
            }
        }
        tracing::debug!(nodes = graph.len(), links = installed, dropped = connects.len() - installed, "graph decoded");
        Ok(graph)
    }

    fn read_embedded_image(&mut self, node: &mut Node, elem: &Element) {
        let Some(offset) = node.get("filename").and_then(SocketValue::as_str).filter(|s| is_offset(s)) else {
            return;
        };
        let offset: u64 = match offset.parse() {
            Ok(o) => o,
            Err(_) => return,
        };
        let Some(blob) = self.blob.as_mut() else {
            tracing::warn!(node = %node.name, "embedded image needs a blob");
            return;
        };
        match blob.read_bytes(offset) {
            Ok(data) => {
                node.image = Some(EmbeddedImage {
                    data,
                    channels: elem.attr_parse(attr::CHANNELS).unwrap_or(4),
                    width: elem.attr_parse(attr::WIDTH).unwrap_or(0),
                    height: elem.attr_parse(attr::HEIGHT).unwrap_or(0),
                    data_type: elem.attr(attr::TYPE).unwrap_or_default().to_string(),
                    colorspace: elem.attr(attr::COLORSPACE).unwrap_or_default().to_string(),
                })
            }
            Err(e) => tracing::warn!(node = %node.name, error = %e, "embedded image unreadable"),
        }
    }

    fn decode_geometry(&mut self, scene: &mut Scene, elem: &Element) {
        let Some(gt) = elem.attr(attr::GEOMETRY_TYPE) else {
            tracing::warn!(tag = %elem.tag, "missing geometry type");
            return;
        };
        let Some(kind) = gt.trim().parse().ok().and_then(GeometryKind::from_id) else {
            tracing::warn!(geometry_type = gt, "unknown geometry type");
            return;
        };
        let mut node = match self.registry.create(kind.type_name()) {
            Ok(node) => node,
            Err(e) => {
                tracing::warn!(error = %e, "geometry skipped");
                return;
            }
        };
        read_node(&mut node, elem, &self.names, self.blob.as_mut());

        let attributes = elem
            .children_named(ATTRIBUTE_TAG)
            .map(|a| self.decode_attribute(a))
            .collect();
        let id = scene.add(node, SceneExtra::Geometry { kind, attributes });
        self.register(elem, id);
    }

    fn decode_attribute(&mut self, elem: &Element) -> Attribute {
        let name = elem.attr(attr::NAME).unwrap_or_default();
        let mut a = Attribute::new(
            name,
            read_type_desc(elem),
            elem.attr_parse(attr::ELEMENT).unwrap_or(0),
        );
        a.std = elem.attr_parse(attr::STD).unwrap_or(0);
        a.flags = elem.attr_parse(attr::FLAGS).unwrap_or(0);

        let Some(buffer) = elem.attr(attr::BUFFER) else {
            return a;
        };
        match elem.attr(attr::VOLUME_TYPE) {
            Some(vt) => {
                if let Some(payload) = self.read_voxel(vt, buffer, elem, name) {
                    a.data = AttributeData::Voxel(payload);
                }
            }
            None if is_offset(buffer) => {
                if let Some(data) = self.read_blob_bytes(buffer, name) {
                    a.data = AttributeData::Buffer(data);
                }
            }
            None => tracing::warn!(attribute = name, buffer, "attribute buffer is not an offset and has no volume type"),
        }
        a
    }

    /// Payload bytes from a blob offset or a standalone file path.
    fn load_payload(&mut self, source: &str, attribute: &str) -> Option<Vec<u8>> {
        if is_offset(source) {
            return self.read_blob_bytes(source, attribute);
        }
        let path = self.base_dir.join(source);
        match std::fs::read(&path) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(attribute, file = %path.display(), error = %e, "volume file unreadable, attribute left empty");
                None
            }
        }
    }

    fn read_blob_bytes(&mut self, offset: &str, attribute: &str) -> Option<Vec<u8>> {
        let Some(blob) = self.blob.as_mut() else {
            tracing::warn!(attribute, offset, "offset without a blob");
            return None;
        };
        let offset: u64 = offset.parse().ok()?;
        match blob.read_bytes(offset) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(attribute, offset, error = %e, "blob record unreadable");
                None
            }
        }
    }

    fn read_voxel(&mut self, vt: &str, source: &str, elem: &Element, name: &str) -> Option<VoxelPayload> {
        if vt == volume_type::RAW {
            let layout = read_raw_layout(elem, name)?;
            let data = self.load_payload(source, name)?;
            let grid = DenseGrid { data, ..layout };
            if let Err(e) = grid.validate() {
                tracing::warn!(attribute = name, error = %e, "dense grid rejected");
                return None;
            }
            return Some(VoxelPayload::Dense(grid));
        }
        if ![volume_type::OPENVDB, volume_type::NANOVDB, volume_type::NANOVDB_MULTIRES].contains(&vt) {
            tracing::warn!(attribute = name, volume_type = vt, "unknown volume type");
            return None;
        }
        let data = self.load_payload(source, name)?;
        match VoxelPayload::from_bytes(vt, data, name) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(attribute = name, error = %e, "voxel payload rejected");
                None
            }
        }
    }

    fn decode_object(&mut self, scene: &mut Scene, elem: &Element) {
        let mut node = match self.registry.create("object") {
            Ok(node) => node,
            Err(e) => {
                tracing::warn!(error = %e, "object skipped");
                return;
            }
        };
        read_node(&mut node, elem, &self.names, self.blob.as_mut());

        let attributes = elem
            .children_named(ATTRIBUTE_TAG)
            .map(|a| {
                let name = a.attr(attr::NAME).unwrap_or_default().to_string();
                let data = a
                    .attr(attr::DATA)
                    .and_then(|d| self.read_blob_bytes(d, &name))
                    .unwrap_or_default();
                ObjectAttribute {
                    type_desc: read_type_desc(a),
                    data,
                    interp: a.attr_parse(attr::INTERP).unwrap_or(0),
                    name,
                }
            })
            .collect();
        if node.get("geometry").and_then(SocketValue::as_node).is_none() {
            tracing::debug!(object = %node.name, "object without geometry");
        }
        let id = scene.add(node, SceneExtra::Object { attributes });
        self.register(elem, id);
    }
}

/// Decode `path` with a new decoder over `registry`.
pub fn load_scene(registry: Arc<NodeRegistry>, path: &Path) -> Result<(Scene, SceneDecoder)> {
    let mut decoder = SceneDecoder::new(registry);
    let scene = decoder.load(path)?;
    Ok((scene, decoder))
}

fn open_blob(index: &Path) -> Option<BlobReader> {
    let path = blob_path(index);
    match BlobReader::open(&path) {
        Ok(blob) => Some(blob),
        Err(e) => {
            tracing::warn!(blob = %path.display(), error = %e, "no blob, offset values will be skipped");
            None
        }
    }
}

fn read_type_desc(elem: &Element) -> TypeDesc {
    TypeDesc {
        basetype: elem.attr_parse(attr::BASETYPE).unwrap_or(0),
        aggregate: elem.attr_parse(attr::AGGREGATE).unwrap_or(0),
        vecsemantics: elem.attr_parse(attr::VECSEMANTICS).unwrap_or(0),
        reserved: elem.attr_parse(attr::RESERVED).unwrap_or(0),
        arraylen: elem.attr_parse(attr::ARRAYLEN).unwrap_or(0),
    }
}

/// Dense layout attributes; every one is required.
fn read_raw_layout(elem: &Element, name: &str) -> Option<DenseGrid> {
    fn required<T: std::str::FromStr>(elem: &Element, key: &str, name: &str) -> Option<T> {
        let v = elem.attr_parse(key);
        if v.is_none() {
            tracing::warn!(attribute = name, field = key, "raw volume field missing or invalid, attribute skipped");
        }
        v
    }
    let dims = [
        required(elem, attr::RAW_DX, name)?,
        required(elem, attr::RAW_DY, name)?,
        required(elem, attr::RAW_DZ, name)?,
    ];
    let scale = [
        required(elem, attr::SCAL_X, name)?,
        required(elem, attr::SCAL_Y, name)?,
        required(elem, attr::SCAL_Z, name)?,
    ];
    let kind: String = required(elem, attr::RAW_TYPE, name)?;
    let channels = required(elem, attr::RAW_CHANNELS, name)?;
    Some(DenseGrid {
        dims,
        scale,
        kind: ScalarKind::from_name(&kind),
        channels,
        data: Vec::new(),
    })
}

/// Apply `elem`'s name and socket children to `node`.
///
/// The node takes the `ui_name` attribute as its name when present (the
/// index `name` may be synthetic); the map key stays the index name.
pub fn read_node(
    node: &mut Node,
    elem: &Element,
    names: &HashMap<String, NodeId>,
    mut blob: Option<&mut BlobReader>,
) {
    if let Some(name) = elem.attr(attr::UI_NAME).or_else(|| elem.attr(attr::NAME)) {
        node.name = name.to_string();
    }
    let ty = node.node_type().clone();
    for socket in elem.children_named(SOCKET_TAG) {
        let (name, alias) = (socket.attr(attr::NAME), socket.attr(attr::UI_NAME));
        let Some(value) = socket.attr(attr::VALUE) else {
            tracing::warn!(node = %node.name, socket = ?name, "socket without value");
            continue;
        };
        let Some(index) = ty.find_input(name, alias) else {
            tracing::warn!(node = %node.name, socket = ?name.or(alias), "unknown attribute");
            continue;
        };
        let def = &ty.inputs[index];
        if def.is_internal() || def.ty == SocketType::Closure {
            continue;
        }
        match parse_socket(value, def, names, blob.as_deref_mut()) {
            Ok(Some(v)) => {
                if let Err(e) = node.set_value(index, v) {
                    tracing::warn!(node = %node.name, socket = %def.name, error = %e, "socket not set");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(node = %node.name, socket = %def.name, error = %e, "socket value rejected"),
        }
    }
}

fn parse_socket(
    value: &str,
    def: &SocketDef,
    names: &HashMap<String, NodeId>,
    blob: Option<&mut BlobReader>,
) -> Result<Option<SocketValue>> {
    match def.ty {
        SocketType::Node => {
            let target = names.get(value.trim()).copied();
            if target.is_none() && !value.trim().is_empty() {
                tracing::warn!(socket = %def.name, target = value, "unresolved node reference");
            }
            Ok(Some(SocketValue::Node(target)))
        }
        SocketType::NodeArray => {
            let mut list = NodeList::new();
            for token in value.split_whitespace() {
                match names.get(token) {
                    Some(id) => list.push(*id),
                    None => {
                        tracing::warn!(socket = %def.name, target = token, "unresolved node reference, array left unchanged");
                        return Ok(None);
                    }
                }
            }
            Ok(Some(SocketValue::NodeArray(list)))
        }
        ty if ty.is_numeric_array() && is_offset(value) => match blob {
            // With a blob attached, all-digit array values are offsets.
            Some(blob) => {
                let offset = value
                    .parse()
                    .map_err(|_| Error::invalid(format!("bad offset '{value}'")))?;
                blob.read_array(offset, ty).map(Some)
            }
            None => from_text(value, def).map(Some),
        },
        _ => from_text(value, def).map(Some),
    }
}

/// Resolve one `connect` record; returns whether a link was installed.
fn connect(graph: &mut ShaderGraph, local: &HashMap<String, NodeId>, elem: &Element) -> bool {
    let (Some(from_name), Some(to_name)) = (elem.attr(attr::FROM_NODE), elem.attr(attr::TO_NODE)) else {
        tracing::warn!("connect record without from_node or to_node");
        return false;
    };
    let from = local.get(from_name).copied();
    let to = local.get(to_name).copied();
    if from.is_none() {
        tracing::warn!(node = from_name, "unknown shader node name");
    }
    if to.is_none() {
        tracing::warn!(node = to_name, "unknown shader node name");
    }
    let (Some(from), Some(to)) = (from, to) else {
        return false;
    };

    let output = graph.node(from).and_then(|n| {
        n.node_type()
            .find_output(elem.attr(attr::FROM_SOCKET), elem.attr(attr::FROM_SOCKET_UI))
    });
    let input = graph.node(to).and_then(|n| {
        n.node_type()
            .find_input(elem.attr(attr::TO_SOCKET), elem.attr(attr::TO_SOCKET_UI))
    });
    match (output, input) {
        (Some(o), Some(i)) => match graph.connect(from, o, to, i) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "link dropped");
                false
            }
        },
        (o, i) => {
            if o.is_none() {
                tracing::warn!(node = from_name, socket = ?elem.attr(attr::FROM_SOCKET), "unknown output socket");
            }
            if i.is_none() {
                tracing::warn!(node = to_name, socket = ?elem.attr(attr::TO_SOCKET), "unknown input socket");
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode::Encoder;

    fn decoder() -> SceneDecoder {
        SceneDecoder::new(Arc::new(NodeRegistry::with_builtins()))
    }

    fn socket(name: &str, value: &str) -> Element {
        Element::new(SOCKET_TAG).with_attr(attr::NAME, name).with_attr(attr::VALUE, value)
    }

    #[test]
    fn test_unknown_elements_tolerated() {
        let mut root = Element::new(ROOT_TAG);
        root.push(Element::new("teapot"));
        root.push(Element::new("Film").with_attr(attr::NAME, "film"));
        let mut film = Element::new("film");
        film.push(socket("no_such_socket", "1"));
        film.push(socket("exposure", "2.5"));
        root.push(film);

        let scene = decoder().decode(&root).unwrap();
        let exposure = scene.get(scene.film).unwrap().node.get("exposure").and_then(SocketValue::as_float);
        assert_eq!(exposure, Some(2.5));
    }

    #[test]
    fn test_alias_fallback_for_sockets() {
        let mut root = Element::new(ROOT_TAG);
        let mut film = Element::new("film");
        film.push(Element::new(SOCKET_TAG).with_attr(attr::UI_NAME, "Exposure").with_attr(attr::VALUE, "3"));
        root.push(film);
        let scene = decoder().decode(&root).unwrap();
        let exposure = scene.get(scene.film).unwrap().node.get("exposure").and_then(SocketValue::as_float);
        assert_eq!(exposure, Some(3.0));
    }

    #[test]
    fn test_forward_reference_is_null() {
        let mut root = Element::new(ROOT_TAG);
        let mut obj = Element::new("object").with_attr(attr::NAME, "o");
        obj.push(socket("geometry", "later"));
        root.push(obj);
        root.push(
            Element::new("mesh")
                .with_attr(attr::NAME, "later")
                .with_attr(attr::GEOMETRY_TYPE, "0"),
        );
        let scene = decoder().decode(&root).unwrap();
        let obj = scene.objects()[0];
        assert_eq!(scene.get(obj).unwrap().node.get("geometry"), Some(&SocketValue::Node(None)));
        assert_eq!(scene.geometry().len(), 1);
    }

    #[test]
    fn test_dangling_links_dropped() {
        let mut shader = Element::new("shader").with_attr(attr::NAME, "s");
        shader.push(Element::new("emission").with_attr(attr::NAME, "e"));
        shader.push(Element::new("not_a_node").with_attr(attr::NAME, "x"));
        let link = |from: &str, to: &str| {
            Element::new(CONNECT_TAG)
                .with_attr(attr::FROM_NODE, from)
                .with_attr(attr::FROM_SOCKET, "emission")
                .with_attr(attr::TO_NODE, to)
                .with_attr(attr::TO_SOCKET, "surface")
        };
        shader.push(link("e", "Material Output"));
        shader.push(link("x", "output"));
        shader.push(link("e", "ghost"));
        shader.push(Element::new(CONNECT_TAG).with_attr(attr::FROM_NODE, "e"));

        let mut dec = decoder();
        let graph = dec.decode_graph(&shader).unwrap();
        assert_eq!(graph.links().len(), 1);
        assert_eq!(graph.links()[0].to, graph.output());
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_scene_node_rejected_inside_graph() {
        let mut shader = Element::new("shader");
        shader.push(Element::new("mesh"));
        let graph = decoder().decode_graph(&shader).unwrap();
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_raw_volume_requires_all_fields() {
        let mut blob = crate::wire::BlobWriter::in_memory();
        let offset = blob.write_bytes(&[0u8; 8]).unwrap();
        let mut vol = Element::new("volume")
            .with_attr(attr::NAME, "v")
            .with_attr(attr::GEOMETRY_TYPE, "2");
        let mut full = Element::new(ATTRIBUTE_TAG)
            .with_attr(attr::NAME, "density")
            .with_attr(attr::BUFFER, offset.to_string())
            .with_attr(attr::VOLUME_TYPE, "raw");
        for (k, v) in [
            (attr::RAW_DX, "2"),
            (attr::RAW_DY, "2"),
            (attr::RAW_DZ, "2"),
            (attr::SCAL_X, "1"),
            (attr::SCAL_Y, "1"),
            (attr::SCAL_Z, "1"),
            (attr::RAW_TYPE, "byte"),
            (attr::RAW_CHANNELS, "1"),
        ] {
            full.set_attr(k, v);
        }
        let mut partial = full.clone();
        partial.attrs.remove(attr::RAW_TYPE);
        partial.set_attr(attr::NAME, "temperature");
        vol.push(full);
        vol.push(partial);
        let mut root = Element::new(ROOT_TAG);
        root.push(vol);

        let mut dec = decoder().with_blob(BlobReader::from_bytes(blob.into_bytes().unwrap()));
        let scene = dec.decode(&root).unwrap();
        let geom = scene.get(scene.geometry()[0]).unwrap();
        let attrs = geom.attributes();
        assert_eq!(attrs.len(), 2);
        assert!(matches!(&attrs[0].data, AttributeData::Voxel(VoxelPayload::Dense(g)) if g.dims == [2, 2, 2]));
        assert_eq!(attrs[1].data, AttributeData::Empty);
    }

    #[test]
    fn test_raw_volume_with_overflowing_dims_left_empty() {
        let mut blob = crate::wire::BlobWriter::in_memory();
        let offset = blob.write_bytes(&[0u8; 64]).unwrap();
        let mut raw = Element::new(ATTRIBUTE_TAG)
            .with_attr(attr::NAME, "density")
            .with_attr(attr::BUFFER, offset.to_string())
            .with_attr(attr::VOLUME_TYPE, "raw");
        for (k, v) in [
            (attr::RAW_DX, "4294967295"),
            (attr::RAW_DY, "4294967295"),
            (attr::RAW_DZ, "4294967295"),
            (attr::SCAL_X, "1"),
            (attr::SCAL_Y, "1"),
            (attr::SCAL_Z, "1"),
            (attr::RAW_TYPE, "float"),
            (attr::RAW_CHANNELS, "1"),
        ] {
            raw.set_attr(k, v);
        }
        let mut vol = Element::new("volume").with_attr(attr::GEOMETRY_TYPE, "2");
        vol.push(raw);
        let mut root = Element::new(ROOT_TAG);
        root.push(vol);

        let mut dec = decoder().with_blob(BlobReader::from_bytes(blob.into_bytes().unwrap()));
        let scene = dec.decode(&root).unwrap();
        let attrs = scene.get(scene.geometry()[0]).unwrap().attributes();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].data, AttributeData::Empty);
    }

    #[test]
    fn test_missing_volume_file_leaves_attribute_empty() {
        let mut vol = Element::new("volume").with_attr(attr::GEOMETRY_TYPE, "2");
        vol.push(
            Element::new(ATTRIBUTE_TAG)
                .with_attr(attr::NAME, "density")
                .with_attr(attr::BUFFER, "does/not/exist.nvdb")
                .with_attr(attr::VOLUME_TYPE, "nanovdb"),
        );
        let mut root = Element::new(ROOT_TAG);
        root.push(vol);
        let scene = decoder().decode(&root).unwrap();
        let attrs = scene.get(scene.geometry()[0]).unwrap().attributes();
        assert_eq!(attrs[0].data, AttributeData::Empty);
    }

    #[test]
    fn test_preserved_shader_reused() {
        let reg = Arc::new(NodeRegistry::with_builtins());
        let scene = Scene::new(&reg).unwrap();
        let root = Encoder::new(None).encode_scene(&scene).unwrap();
        let decoded = SceneDecoder::new(reg).decode(&root).unwrap();
        assert_eq!(decoded.shaders().len(), scene.shaders().len());
        let bg = decoded.get(decoded.background).unwrap().node.get("shader").and_then(SocketValue::as_node);
        assert_eq!(bg, decoded.find_shader("default_background"));
    }
}
