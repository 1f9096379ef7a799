//! Live edits applied to a loaded scene between frames.

use super::decode::SceneDecoder;
use super::format::attr;
use super::index::Element;
use crate::graph::NodeId;
use crate::scene::{AttributeData, Scene};
use crate::util::Result;
use crate::volume::VoxelPayload;

/// Decode a material-edit payload and apply it to the first shader whose
/// name matches the payload's.
///
/// Returns the updated shader, or `None` for an empty payload or when no
/// shader matches. A payload that does not parse is an error.
#[tracing::instrument(skip_all, fields(len = payload.len()))]
pub fn apply_material(decoder: &mut SceneDecoder, scene: &mut Scene, payload: &[u8]) -> Result<Option<NodeId>> {
    if payload.is_empty() {
        return Ok(None);
    }
    let elem = Element::from_slice(payload)?;
    if !elem.tag.eq_ignore_ascii_case("shader") {
        tracing::warn!(tag = %elem.tag, "material payload is not a shader element");
    }
    let Some(name) = elem.attr(attr::UI_NAME).or_else(|| elem.attr(attr::NAME)) else {
        tracing::warn!("material payload without a shader name");
        return Ok(None);
    };
    let Some(shader) = scene.find_shader(name) else {
        tracing::debug!(shader = name, "no matching shader, material ignored");
        return Ok(None);
    };
    decoder.decode_shader_into(scene, shader, &elem)?;
    tracing::debug!(shader = name, "material applied");
    Ok(Some(shader))
}

/// Replace the voxel payload of `attribute` on the first geometry named
/// `geometry`. Returns whether anything was replaced.
pub fn apply_volume(scene: &mut Scene, geometry: &str, attribute: &str, payload: VoxelPayload) -> bool {
    let Some(id) = scene.find_geometry(geometry) else {
        tracing::warn!(geometry, "volume target geometry not found");
        return false;
    };
    let Some(attrs) = scene.get_mut(id).and_then(|g| g.attributes_mut()) else {
        return false;
    };
    let Some(target) = attrs.iter_mut().find(|a| a.name == attribute) else {
        tracing::warn!(geometry, attribute, "volume target attribute not found");
        return false;
    };
    target.data = AttributeData::Voxel(payload);
    tracing::info!(geometry, attribute, "volume replaced");
    true
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::graph::{NodeRegistry, SocketValue};
    use crate::scene::{Attribute, GeometryKind, SceneExtra, TypeDesc};
    use crate::util::Vec3;
    use crate::wire::encode_shader_payload;

    fn setup() -> (Arc<NodeRegistry>, Scene) {
        let reg = Arc::new(NodeRegistry::with_builtins());
        let scene = Scene::new(&reg).unwrap();
        (reg, scene)
    }

    #[test]
    fn test_empty_payload_is_noop() {
        let (reg, mut scene) = setup();
        let mut dec = SceneDecoder::new(reg);
        assert_eq!(apply_material(&mut dec, &mut scene, &[]).unwrap(), None);
    }

    #[test]
    fn test_payload_replaces_graph() {
        let (reg, mut scene) = setup();
        let target = scene.find_shader("default_background").unwrap();

        // Edit a copy, encode it, apply to the original.
        let mut edited = scene.clone();
        let mut graph = crate::graph::ShaderGraph::new(&reg).unwrap();
        let bg = reg
            .create("background_shader")
            .unwrap()
            .with("color", SocketValue::Float3(Vec3::new(1.0, 0.0, 0.0)))
            .unwrap();
        let bg = graph.add(bg);
        let out = graph.output();
        graph.connect(bg, 0, out, 0).unwrap();
        edited.set_graph(target, graph).unwrap();
        let payload = encode_shader_payload(&edited, target).unwrap();

        let mut dec = SceneDecoder::new(reg);
        assert_eq!(apply_material(&mut dec, &mut scene, &payload).unwrap(), Some(target));
        assert_eq!(scene.background_color(), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_unknown_shader_ignored() {
        let (reg, mut scene) = setup();
        let payload = Element::new("shader").with_attr(attr::NAME, "nope").to_bytes().unwrap();
        let mut dec = SceneDecoder::new(reg);
        assert_eq!(apply_material(&mut dec, &mut scene, &payload).unwrap(), None);
        assert!(apply_material(&mut dec, &mut scene, b"{not json").is_err());
    }

    #[test]
    fn test_volume_swap() {
        let (reg, mut scene) = setup();
        let mut vol = reg.create("volume").unwrap();
        vol.name = "smoke".into();
        let mut density = Attribute::new("density", TypeDesc::FLOAT, 11);
        density.data = AttributeData::Voxel(VoxelPayload::Device(vec![0]));
        scene.add(vol, SceneExtra::Geometry { kind: GeometryKind::Volume, attributes: vec![density] });

        assert!(!apply_volume(&mut scene, "fire", "density", VoxelPayload::Device(vec![1])));
        assert!(!apply_volume(&mut scene, "smoke", "heat", VoxelPayload::Device(vec![1])));
        assert!(apply_volume(&mut scene, "smoke", "density", VoxelPayload::Device(vec![7])));
        let id = scene.find_geometry("smoke").unwrap();
        assert_eq!(
            scene.get(id).unwrap().attributes()[0].data,
            AttributeData::Voxel(VoxelPayload::Device(vec![7]))
        );
    }
}
