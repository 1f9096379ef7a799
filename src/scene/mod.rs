//! Live scene: an arena of scene-level nodes.
//!
//! Every scene node (camera, film, shader, geometry, object, ...) sits in one
//! arena and is addressed by [`NodeId`]. Node-reference sockets such as
//! `object.geometry` hold ids into this arena. Shaders own their graph;
//! geometry owns its attributes.

mod attribute;

pub use attribute::*;

use crate::graph::{Node, NodeId, NodeRegistry, ShaderGraph, SocketValue, OUTPUT_NODE};
use crate::util::{BoundBox, Error, Result, Transform, Vec3};

/// Shader names that are never renamed on encode and are reused on decode.
pub const PRESERVED_SHADER_NAMES: [&str; 5] = [
    "default_background",
    "default_empty",
    "default_light",
    "default_surface",
    "default_volume",
];

/// Geometry flavours and their wire ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    Mesh = 0,
    Hair = 1,
    Volume = 2,
    PointCloud = 3,
    Light = 4,
}

impl GeometryKind {
    pub const ALL: [Self; 5] = [Self::Mesh, Self::Hair, Self::Volume, Self::PointCloud, Self::Light];

    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| *k as i32 == id)
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.type_name() == name)
    }

    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Mesh => "mesh",
            Self::Hair => "hair",
            Self::Volume => "volume",
            Self::PointCloud => "pointcloud",
            Self::Light => "light",
        }
    }
}

/// Data attached to a scene node beyond its sockets.
#[derive(Clone, Debug)]
pub enum SceneExtra {
    None,
    Shader(ShaderGraph),
    Geometry { kind: GeometryKind, attributes: Vec<Attribute> },
    Object { attributes: Vec<ObjectAttribute> },
}

/// One entry in the scene arena.
#[derive(Clone, Debug)]
pub struct SceneNode {
    pub node: Node,
    pub extra: SceneExtra,
}

impl SceneNode {
    pub fn graph(&self) -> Option<&ShaderGraph> {
        match &self.extra {
            SceneExtra::Shader(g) => Some(g),
            _ => None,
        }
    }

    pub fn geometry_kind(&self) -> Option<GeometryKind> {
        match &self.extra {
            SceneExtra::Geometry { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        match &self.extra {
            SceneExtra::Geometry { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub fn attributes_mut(&mut self) -> Option<&mut Vec<Attribute>> {
        match &mut self.extra {
            SceneExtra::Geometry { attributes, .. } => Some(attributes),
            _ => None,
        }
    }

    pub fn object_attributes(&self) -> &[ObjectAttribute] {
        match &self.extra {
            SceneExtra::Object { attributes } => attributes,
            _ => &[],
        }
    }
}

/// Render scene.
#[derive(Clone, Debug)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    pub camera: NodeId,
    pub dicing_camera: NodeId,
    pub film: NodeId,
    pub integrator: NodeId,
    pub background: NodeId,
}

impl Scene {
    /// Scene with the singleton nodes and the default shaders.
    pub fn new(registry: &NodeRegistry) -> Result<Self> {
        let mut scene = Self {
            nodes: Vec::new(),
            camera: NodeId(0),
            dicing_camera: NodeId(0),
            film: NodeId(0),
            integrator: NodeId(0),
            background: NodeId(0),
        };

        for name in PRESERVED_SHADER_NAMES {
            let graph = default_graph(registry, name)?;
            let mut shader = registry.create("shader")?;
            shader.name = name.to_string();
            scene.add(shader, SceneExtra::Shader(graph));
        }

        scene.camera = scene.add_named(registry, "camera", "camera")?;
        scene.dicing_camera = scene.add_named(registry, "dicing_camera", "dicing_camera")?;
        scene.film = scene.add_named(registry, "film", "film")?;
        scene.integrator = scene.add_named(registry, "integrator", "integrator")?;
        scene.background = scene.add_named(registry, "background", "background")?;

        let bg_shader = scene.find_shader("default_background");
        scene.nodes[scene.background.index()]
            .node
            .set("shader", SocketValue::Node(bg_shader))?;

        Ok(scene)
    }

    fn add_named(&mut self, registry: &NodeRegistry, ty: &str, name: &str) -> Result<NodeId> {
        let mut node = registry.create(ty)?;
        node.name = name.to_string();
        Ok(self.add(node, SceneExtra::None))
    }

    /// Add a node to the arena.
    pub fn add(&mut self, node: Node, extra: SceneExtra) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(SceneNode { node, extra });
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.index())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i as u32), n))
    }

    fn ids_where(&self, pred: impl Fn(&SceneNode) -> bool) -> Vec<NodeId> {
        self.iter().filter(|(_, n)| pred(n)).map(|(id, _)| id).collect()
    }

    pub fn shaders(&self) -> Vec<NodeId> {
        self.ids_where(|n| matches!(n.extra, SceneExtra::Shader(_)))
    }

    pub fn geometry(&self) -> Vec<NodeId> {
        self.ids_where(|n| matches!(n.extra, SceneExtra::Geometry { .. }))
    }

    pub fn objects(&self) -> Vec<NodeId> {
        self.ids_where(|n| matches!(n.extra, SceneExtra::Object { .. }))
    }

    /// Nodes of a given type name with no extra data (passes, particle systems, ...).
    pub fn nodes_of_type(&self, type_name: &str) -> Vec<NodeId> {
        self.ids_where(|n| matches!(n.extra, SceneExtra::None) && n.node.type_name() == type_name)
    }

    /// First shader with the given name.
    pub fn find_shader(&self, name: &str) -> Option<NodeId> {
        self.iter()
            .find(|(_, n)| matches!(n.extra, SceneExtra::Shader(_)) && n.node.name == name)
            .map(|(id, _)| id)
    }

    /// First geometry with the given name.
    pub fn find_geometry(&self, name: &str) -> Option<NodeId> {
        self.iter()
            .find(|(_, n)| matches!(n.extra, SceneExtra::Geometry { .. }) && n.node.name == name)
            .map(|(id, _)| id)
    }

    /// Replace a shader's graph.
    pub fn set_graph(&mut self, shader: NodeId, graph: ShaderGraph) -> Result<()> {
        match self.nodes.get_mut(shader.index()).map(|n| &mut n.extra) {
            Some(SceneExtra::Shader(g)) => {
                *g = graph;
                Ok(())
            }
            _ => Err(Error::invalid(format!("{shader} is not a shader"))),
        }
    }

    /// Object-space bounds of a geometry node.
    pub fn geometry_bounds(&self, id: NodeId) -> BoundBox {
        let mut bounds = BoundBox::EMPTY;
        let Some(geom) = self.get(id) else {
            return bounds;
        };
        for key in ["verts", "curve_keys", "points"] {
            if let Some(points) = geom.node.get(key).and_then(SocketValue::as_float3_array) {
                for p in points {
                    bounds.expand_by_point(*p);
                }
            }
        }
        bounds
    }

    /// World-space union of all object bounds.
    pub fn world_bounds(&self) -> BoundBox {
        let mut bounds = BoundBox::EMPTY;
        for id in self.objects() {
            let Some(obj) = self.get(id) else { continue };
            let Some(geom) = obj.node.get("geometry").and_then(SocketValue::as_node) else {
                continue;
            };
            let tfm = obj
                .node
                .get("tfm")
                .and_then(SocketValue::as_transform)
                .copied()
                .unwrap_or(Transform::IDENTITY);
            bounds.expand_by_box(&self.geometry_bounds(geom).transformed(&tfm));
        }
        bounds
    }

    /// Background colour of the scene's background shader, if it has one.
    pub fn background_color(&self) -> Vec3 {
        let shader = self
            .get(self.background)
            .and_then(|bg| bg.node.get("shader"))
            .and_then(SocketValue::as_node);
        let Some(graph) = shader.and_then(|s| self.get(s)).and_then(SceneNode::graph) else {
            return Vec3::ZERO;
        };
        let output = graph.output();
        let Some(link) = graph.input_link(output, 0) else {
            return Vec3::ZERO;
        };
        let Some(node) = graph.node(link.from) else {
            return Vec3::ZERO;
        };
        let color = node.get("color").and_then(SocketValue::as_float3).unwrap_or(Vec3::ZERO);
        let strength = node.get("strength").and_then(SocketValue::as_float).unwrap_or(1.0);
        color * strength
    }
}

/// Graph for one of the preserved default shaders.
fn default_graph(registry: &NodeRegistry, name: &str) -> Result<ShaderGraph> {
    let mut graph = ShaderGraph::new(registry)?;
    let out = graph.output();
    let (ty, input) = match name {
        "default_surface" => ("diffuse_bsdf", "surface"),
        "default_volume" => ("principled_volume", "volume"),
        "default_light" => ("emission", "surface"),
        "default_background" => ("background_shader", "surface"),
        _ => return Ok(graph),
    };
    let mut node = registry.create(ty)?;
    if ty == "background_shader" {
        node.set("color", SocketValue::Float3(Vec3::splat(0.05)))?;
    }
    let id = graph.add(node);
    let to_socket = registry
        .get(OUTPUT_NODE)
        .and_then(|t| t.input_index(input))
        .ok_or_else(|| Error::invalid(format!("output node has no '{input}' input")))?;
    graph.connect(id, 0, out, to_socket)?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_scene_defaults() {
        let reg = NodeRegistry::with_builtins();
        let scene = Scene::new(&reg).unwrap();
        assert_eq!(scene.shaders().len(), PRESERVED_SHADER_NAMES.len());
        assert!(scene.find_shader("default_surface").is_some());
        assert_eq!(scene.get(scene.camera).unwrap().node.type_name(), "camera");
        let c = scene.background_color();
        assert!((c - Vec3::splat(0.05)).length() < 1e-6);
    }

    #[test]
    fn test_world_bounds() {
        let reg = NodeRegistry::with_builtins();
        let mut scene = Scene::new(&reg).unwrap();

        let mesh = reg
            .create("mesh")
            .unwrap()
            .with("verts", SocketValue::Float3Array(vec![Vec3::ZERO, Vec3::ONE]))
            .unwrap();
        let geom = scene.add(mesh, SceneExtra::Geometry { kind: GeometryKind::Mesh, attributes: vec![] });

        let mut tfm = Transform::IDENTITY;
        tfm.x.w = 5.0;
        let obj = reg
            .create("object")
            .unwrap()
            .with("geometry", SocketValue::Node(Some(geom)))
            .unwrap()
            .with("tfm", SocketValue::Transform(tfm))
            .unwrap();
        scene.add(obj, SceneExtra::Object { attributes: vec![] });

        let b = scene.world_bounds();
        assert_eq!(b.min, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(b.max, Vec3::new(6.0, 1.0, 1.0));
    }

    #[test]
    fn test_geometry_kind_ids() {
        assert_eq!(GeometryKind::from_id(2), Some(GeometryKind::Volume));
        assert_eq!(GeometryKind::from_type_name("pointcloud"), Some(GeometryKind::PointCloud));
        assert_eq!(GeometryKind::from_id(9), None);
    }

    #[test]
    fn test_set_graph_requires_shader() {
        let reg = NodeRegistry::with_builtins();
        let mut scene = Scene::new(&reg).unwrap();
        let g = ShaderGraph::new(&reg).unwrap();
        assert!(scene.set_graph(scene.film, g.clone()).is_err());
        let s = scene.find_shader("default_empty").unwrap();
        scene.set_graph(s, g).unwrap();
    }
}
