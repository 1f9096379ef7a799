//! Integration tests for the scene index + blob format.

use std::sync::Arc;

use render_bridge::graph::{EnumDef, NodeRegistry, NodeTypeBuilder, ShaderGraph, SocketType, SocketValue, OUTPUT_NODE};
use render_bridge::scene::{GeometryKind, Scene, SceneExtra};
use render_bridge::util::{Transform, Vec2, Vec3, Vec4};
use render_bridge::wire::format::{attr, CONNECT_TAG, SOCKET_TAG};
use render_bridge::wire::{apply_material, load_scene, write_scene, Element, SceneDecoder};

fn registry() -> Arc<NodeRegistry> {
    let mut reg = NodeRegistry::with_builtins();
    reg.register(
        NodeTypeBuilder::shader("probe")
            .boolean("flag", "Flag", false)
            .int("count", "Count", 0)
            .int64("big", "Big", 0)
            .uint("mask", "Mask", 0)
            .float("weight", "Weight", 0.0)
            .float2("uv", "UV", Vec2::ZERO)
            .float3("color", "Color", Vec3::ZERO)
            .float4("tint", "Tint", Vec4::ZERO)
            .transform("tfm", "Transform", Transform::IDENTITY)
            .enumeration("mode", "Mode", EnumDef::new([("alpha", 1), ("beta", 7)]), 1)
            .string("label", "Label", "")
            .array("flags", "Flags", SocketType::BooleanArray)
            .array("counts", "Counts", SocketType::IntArray)
            .array("weights", "Weights", SocketType::FloatArray)
            .array("uvs", "UVs", SocketType::Float2Array)
            .array("points", "Points", SocketType::Float3Array)
            .array("tfms", "Transforms", SocketType::TransformArray)
            .array("tags", "Tags", SocketType::StringArray)
            .output("bsdf", "BSDF", SocketType::Closure)
            .build(),
    );
    Arc::new(reg)
}

fn probe_values() -> Vec<(&'static str, SocketValue)> {
    let tfm = Transform::from_rows(&[1.0, 0.0, 0.0, 2.5, 0.0, 0.5, 0.0, -1.0, 0.0, 0.0, 2.0, 0.25]);
    vec![
        ("flag", SocketValue::Bool(true)),
        ("count", SocketValue::Int(-42)),
        ("big", SocketValue::Int64(1 << 40)),
        ("mask", SocketValue::UInt(0xdead_beef)),
        ("weight", SocketValue::Float(0.375)),
        ("uv", SocketValue::Float2(Vec2::new(0.5, -0.25))),
        ("color", SocketValue::Float3(Vec3::new(1.0, 0.5, 0.125))),
        ("tint", SocketValue::Float4(Vec4::new(0.25, 0.5, 0.75, 1.0))),
        ("tfm", SocketValue::Transform(tfm)),
        ("mode", SocketValue::Enum(7)),
        ("label", SocketValue::String("oak".into())),
        ("flags", SocketValue::BoolArray(vec![true, false, true])),
        ("counts", SocketValue::IntArray(vec![3, -1, 9])),
        ("weights", SocketValue::FloatArray(vec![0.5, 1.5])),
        ("uvs", SocketValue::Float2Array(vec![Vec2::new(0.0, 1.0), Vec2::new(0.5, 0.5)])),
        ("points", SocketValue::Float3Array(vec![Vec3::ONE, Vec3::new(-2.0, 0.0, 4.0)])),
        ("tfms", SocketValue::TransformArray(vec![Transform::IDENTITY, tfm])),
        ("tags", SocketValue::StringArray(vec!["a".into(), "bc".into()])),
    ]
}

fn build_scene(reg: &NodeRegistry) -> Scene {
    let mut scene = Scene::new(reg).unwrap();

    let mut graph = ShaderGraph::new(reg).unwrap();
    let mut probe = reg.create_shader_node("probe").unwrap();
    for (name, value) in probe_values() {
        probe.set(name, value).unwrap();
    }
    let probe = graph.add(probe);
    graph.connect(probe, 0, graph.output(), 0).unwrap();
    let mut shader = reg.create("shader").unwrap();
    shader.name = "probe_mat".into();
    let shader = scene.add(shader, SceneExtra::Shader(graph));

    let mesh = reg
        .create("mesh")
        .unwrap()
        .with("verts", SocketValue::Float3Array(vec![Vec3::ZERO, Vec3::X, Vec3::Y]))
        .unwrap()
        .with("used_shaders", SocketValue::NodeArray([shader].into_iter().collect()))
        .unwrap();
    let mesh = scene.add(mesh, SceneExtra::Geometry { kind: GeometryKind::Mesh, attributes: vec![] });
    let object = reg
        .create("object")
        .unwrap()
        .with("geometry", SocketValue::Node(Some(mesh)))
        .unwrap();
    scene.add(object, SceneExtra::Object { attributes: vec![] });
    scene
}

#[test]
fn test_roundtrip_every_socket_type() {
    let reg = registry();
    let scene = build_scene(&reg);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.json");
    write_scene(&scene, &path).unwrap();
    assert!(dir.path().join("scene.json.bin").is_file());

    let (loaded, _decoder) = load_scene(reg.clone(), &path).unwrap();

    let shader = loaded.find_shader("probe_mat").expect("shader survives");
    let graph = loaded.get(shader).and_then(|s| s.graph()).unwrap();
    let (probe_id, probe) = graph.nodes().find(|(_, n)| n.type_name() == "probe").unwrap();
    for (name, expected) in probe_values() {
        assert_eq!(probe.get(name), Some(&expected), "socket {name}");
    }
    let link = graph.input_link(graph.output(), 0).expect("surface link");
    assert_eq!(link.from, probe_id);
    assert_eq!(graph.links().len(), 1);

    let mesh = loaded.geometry()[0];
    let mesh_node = &loaded.get(mesh).unwrap().node;
    assert_eq!(mesh_node.get("verts").and_then(SocketValue::as_float3_array).map(<[Vec3]>::len), Some(3));
    assert_eq!(mesh_node.get("used_shaders").and_then(SocketValue::as_node_list), Some(&[shader][..]));

    let object = loaded.objects()[0];
    let geometry = loaded.get(object).unwrap().node.get("geometry").and_then(SocketValue::as_node);
    assert_eq!(geometry, Some(mesh));
}

#[test]
fn test_dangling_links_never_installed() {
    let reg = registry();
    let mut scene = Scene::new(&reg).unwrap();
    let mut decoder = SceneDecoder::new(reg.clone());

    let mut elem = Element::new("shader").with_attr(attr::NAME, "default_surface");
    elem.push(Element::new("emission").with_attr(attr::NAME, "glow"));
    elem.push(
        Element::new(CONNECT_TAG)
            .with_attr(attr::FROM_NODE, "ghost")
            .with_attr(attr::FROM_SOCKET, "emission")
            .with_attr(attr::TO_NODE, OUTPUT_NODE)
            .with_attr(attr::TO_SOCKET, "surface"),
    );
    elem.push(
        Element::new(CONNECT_TAG)
            .with_attr(attr::FROM_NODE, "glow")
            .with_attr(attr::FROM_SOCKET, "emission")
            .with_attr(attr::TO_NODE, "nowhere")
            .with_attr(attr::TO_SOCKET, "surface"),
    );
    elem.push(
        Element::new(CONNECT_TAG)
            .with_attr(attr::FROM_NODE, "glow")
            .with_attr(attr::FROM_SOCKET, "no_such_output")
            .with_attr(attr::TO_NODE, OUTPUT_NODE)
            .with_attr(attr::TO_SOCKET, "surface"),
    );
    let payload = elem.to_bytes().unwrap();

    let shader = apply_material(&mut decoder, &mut scene, &payload).unwrap().unwrap();
    let graph = scene.get(shader).and_then(|s| s.graph()).unwrap();
    assert_eq!(graph.len(), 2, "output plus the emission node");
    assert!(graph.links().is_empty());
}

#[test]
fn test_alias_link_and_socket_fallback() {
    let reg = registry();
    let mut scene = Scene::new(&reg).unwrap();
    let mut decoder = SceneDecoder::new(reg.clone());

    let mut elem = Element::new("shader").with_attr(attr::NAME, "default_surface");
    let mut glow = Element::new("emission").with_attr(attr::NAME, "glow");
    glow.push(Element::new(SOCKET_TAG).with_attr(attr::UI_NAME, "Strength").with_attr(attr::VALUE, "3"));
    elem.push(glow);
    elem.push(
        Element::new(CONNECT_TAG)
            .with_attr(attr::FROM_NODE, "glow")
            .with_attr(attr::FROM_SOCKET_UI, "Emission")
            .with_attr(attr::TO_NODE, "Material Output")
            .with_attr(attr::TO_SOCKET_UI, "Surface"),
    );
    let payload = elem.to_bytes().unwrap();
    let shader = apply_material(&mut decoder, &mut scene, &payload).unwrap().unwrap();
    let graph = scene.get(shader).and_then(|s| s.graph()).unwrap();
    let link = graph.input_link(graph.output(), 0).expect("linked by alias");
    let glow = graph.node(link.from).unwrap();
    assert_eq!(glow.get("strength"), Some(&SocketValue::Float(3.0)));
}

#[test]
fn test_missing_blob_skips_offsets() {
    let reg = registry();
    let scene = build_scene(&reg);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.json");
    write_scene(&scene, &path).unwrap();
    std::fs::remove_file(dir.path().join("scene.json.bin")).unwrap();

    // Offsets without a blob are parsed as inline text and rejected per socket;
    // the rest of the scene still loads.
    let (loaded, decoder) = load_scene(reg, &path).unwrap();
    assert!(!decoder.has_blob());
    assert!(loaded.find_shader("probe_mat").is_some());
    assert_eq!(loaded.objects().len(), 1);
}
