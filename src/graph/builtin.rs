//! Built-in node declarations.

use super::node::{NodeCategory, NodeTypeBuilder};
use super::registry::NodeRegistry;
use super::socket::{EnumDef, SocketType};
use crate::util::{Transform, Vec2, Vec3};

/// Name of the terminal shader-graph node.
pub const OUTPUT_NODE: &str = "output";

pub fn register_all(reg: &mut NodeRegistry) {
    register_shader_nodes(reg);
    register_scene_nodes(reg);
}

fn interpolation() -> EnumDef {
    EnumDef::sequential(["linear", "closest", "cubic", "smart"])
}

fn extension() -> EnumDef {
    EnumDef::sequential(["periodic", "clip", "extend", "mirror"])
}

fn register_shader_nodes(reg: &mut NodeRegistry) {
    reg.register(
        NodeTypeBuilder::new(OUTPUT_NODE, NodeCategory::ShaderOutput)
            .closure("surface", "Surface")
            .closure("volume", "Volume")
            .float3("displacement", "Displacement", Vec3::ZERO)
            .float3("normal", "Normal", Vec3::ZERO)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::shader("principled_bsdf")
            .enumeration(
                "distribution",
                "Distribution",
                EnumDef::new([("ggx", 2), ("multi_ggx", 5)]),
                5,
            )
            .enumeration(
                "subsurface_method",
                "Subsurface Method",
                EnumDef::new([("burley", 0), ("random_walk", 1), ("random_walk_skin", 2)]),
                1,
            )
            .float3("base_color", "Base Color", Vec3::splat(0.8))
            .float("metallic", "Metallic", 0.0)
            .float("roughness", "Roughness", 0.5)
            .float("ior", "IOR", 1.5)
            .float("alpha", "Alpha", 1.0)
            .float3("normal", "Normal", Vec3::ZERO)
            .float("subsurface_weight", "Subsurface Weight", 0.0)
            .float3("subsurface_radius", "Subsurface Radius", Vec3::new(1.0, 0.2, 0.1))
            .float("specular_ior_level", "Specular IOR Level", 0.5)
            .float("transmission_weight", "Transmission Weight", 0.0)
            .float("coat_weight", "Coat Weight", 0.0)
            .float3("emission_color", "Emission Color", Vec3::ONE)
            .float("emission_strength", "Emission Strength", 0.0)
            .output("bsdf", "BSDF", SocketType::Closure)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::shader("diffuse_bsdf")
            .float3("color", "Color", Vec3::splat(0.8))
            .float("roughness", "Roughness", 0.0)
            .float3("normal", "Normal", Vec3::ZERO)
            .output("bsdf", "BSDF", SocketType::Closure)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::shader("emission")
            .float3("color", "Color", Vec3::ONE)
            .float("strength", "Strength", 10.0)
            .output("emission", "Emission", SocketType::Closure)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::shader("background_shader")
            .float3("color", "Color", Vec3::splat(0.8))
            .float("strength", "Strength", 1.0)
            .output("background", "Background", SocketType::Closure)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::shader("principled_volume")
            .string("density_attribute", "Density Attribute", "density")
            .string("color_attribute", "Color Attribute", "")
            .string("temperature_attribute", "Temperature Attribute", "temperature")
            .float3("color", "Color", Vec3::splat(0.5))
            .float("density", "Density", 1.0)
            .float("anisotropy", "Anisotropy", 0.0)
            .float3("absorption_color", "Absorption Color", Vec3::ZERO)
            .float("emission_strength", "Emission Strength", 0.0)
            .float3("emission_color", "Emission Color", Vec3::ONE)
            .float("blackbody_intensity", "Blackbody", 0.0)
            .output("volume", "Volume", SocketType::Closure)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::shader("image_texture")
            .string("filename", "Filename", "")
            .string("colorspace", "Colorspace", "sRGB")
            .enumeration(
                "alpha_type",
                "Alpha Type",
                EnumDef::sequential(["unassociated", "associated", "channel_packed", "ignore", "auto"]),
                4,
            )
            .enumeration("interpolation", "Interpolation", interpolation(), 0)
            .enumeration("extension", "Extension", extension(), 0)
            .enumeration(
                "projection",
                "Projection",
                EnumDef::sequential(["flat", "box", "sphere", "tube"]),
                0,
            )
            .float("projection_blend", "Projection Blend", 0.0)
            .array("tiles", "Tiles", SocketType::IntArray)
            .boolean("animated", "Animated", false)
            .float3("vector", "Vector", Vec3::ZERO)
            .output("color", "Color", SocketType::Float3)
            .output("alpha", "Alpha", SocketType::Float)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::shader("environment_texture")
            .string("filename", "Filename", "")
            .string("colorspace", "Colorspace", "sRGB")
            .enumeration(
                "alpha_type",
                "Alpha Type",
                EnumDef::sequential(["unassociated", "associated", "channel_packed", "ignore", "auto"]),
                4,
            )
            .enumeration("interpolation", "Interpolation", interpolation(), 0)
            .enumeration(
                "projection",
                "Projection",
                EnumDef::sequential(["equirectangular", "mirror_ball"]),
                0,
            )
            .boolean("animated", "Animated", false)
            .float3("vector", "Vector", Vec3::ZERO)
            .output("color", "Color", SocketType::Float3)
            .output("alpha", "Alpha", SocketType::Float)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::shader("attribute")
            .string("attribute", "Attribute", "")
            .output("color", "Color", SocketType::Float3)
            .output("vector", "Vector", SocketType::Float3)
            .output("fac", "Fac", SocketType::Float)
            .output("alpha", "Alpha", SocketType::Float)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::shader("texture_coordinate")
            .boolean("from_dupli", "From Dupli", false)
            .boolean("use_transform", "Use Transform", false)
            .transform("ob_tfm", "Object Transform", Transform::IDENTITY)
            .output("generated", "Generated", SocketType::Float3)
            .output("normal", "Normal", SocketType::Float3)
            .output("uv", "UV", SocketType::Float3)
            .output("object", "Object", SocketType::Float3)
            .output("camera", "Camera", SocketType::Float3)
            .output("window", "Window", SocketType::Float3)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::shader("mapping")
            .enumeration(
                "mapping_type",
                "Type",
                EnumDef::sequential(["point", "texture", "vector", "normal"]),
                0,
            )
            .float3("vector", "Vector", Vec3::ZERO)
            .float3("location", "Location", Vec3::ZERO)
            .float3("rotation", "Rotation", Vec3::ZERO)
            .float3("scale", "Scale", Vec3::ONE)
            .output("vector", "Vector", SocketType::Float3)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::shader("value")
            .float("value", "Value", 0.0)
            .output("value", "Value", SocketType::Float)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::shader("color")
            .float3("value", "Value", Vec3::ZERO)
            .output("color", "Color", SocketType::Float3)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::shader("mix")
            .enumeration(
                "mix_type",
                "Type",
                EnumDef::sequential([
                    "mix", "add", "multiply", "screen", "overlay", "subtract", "divide",
                    "difference", "darken", "lighten",
                ]),
                0,
            )
            .boolean("use_clamp", "Use Clamp", false)
            .float("fac", "Fac", 0.5)
            .float3("color1", "Color1", Vec3::ZERO)
            .float3("color2", "Color2", Vec3::ZERO)
            .output("color", "Color", SocketType::Float3)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::shader("math")
            .enumeration(
                "math_type",
                "Type",
                EnumDef::sequential([
                    "add", "subtract", "multiply", "divide", "sine", "cosine", "tangent", "power",
                    "logarithm", "minimum", "maximum", "round", "less_than", "greater_than",
                ]),
                0,
            )
            .boolean("use_clamp", "Use Clamp", false)
            .float("value1", "Value1", 0.5)
            .float("value2", "Value2", 0.5)
            .float("value3", "Value3", 0.0)
            .output("value", "Value", SocketType::Float)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::shader("rgb_ramp")
            .array("ramp", "Ramp", SocketType::Float3Array)
            .array("ramp_alpha", "Ramp Alpha", SocketType::FloatArray)
            .boolean("interpolate", "Interpolate", true)
            .float("fac", "Fac", 0.0)
            .output("color", "Color", SocketType::Float3)
            .output("alpha", "Alpha", SocketType::Float)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::shader("uvmap")
            .string("attribute", "Attribute", "")
            .boolean("from_dupli", "From Dupli", false)
            .output("uv", "UV", SocketType::Float3)
            .build(),
    );
}

fn register_scene_nodes(reg: &mut NodeRegistry) {
    let camera = |name: &str| {
        NodeTypeBuilder::scene(name)
            .float("shuttertime", "Shutter Time", 1.0)
            .enumeration(
                "camera_type",
                "Type",
                EnumDef::sequential(["perspective", "orthographic", "panorama"]),
                0,
            )
            .float("fov", "Field of View", std::f32::consts::FRAC_PI_4)
            .float("nearclip", "Near Clip", 1e-5)
            .float("farclip", "Far Clip", 1e5)
            .float("aperturesize", "Aperture Size", 0.0)
            .float("focaldistance", "Focal Distance", 10.0)
            .float("sensorwidth", "Sensor Width", 0.036)
            .float("sensorheight", "Sensor Height", 0.024)
            .float("viewplane_left", "Viewplane Left", -1.0)
            .float("viewplane_right", "Viewplane Right", 1.0)
            .float("viewplane_bottom", "Viewplane Bottom", -1.0)
            .float("viewplane_top", "Viewplane Top", 1.0)
            .transform("matrix", "Matrix", Transform::IDENTITY)
            .int("full_width", "Full Width", 1024)
            .int("full_height", "Full Height", 512)
            .boolean("use_perspective_motion", "Use Perspective Motion", false)
            .build()
    };
    reg.register(camera("camera"));
    reg.register(camera("dicing_camera"));

    reg.register(
        NodeTypeBuilder::scene("film")
            .float("exposure", "Exposure", 1.0)
            .float("pass_alpha_threshold", "Pass Alpha Threshold", 0.0)
            .enumeration(
                "filter_type",
                "Filter Type",
                EnumDef::sequential(["box", "gaussian", "blackman_harris"]),
                1,
            )
            .float("filter_width", "Filter Width", 1.0)
            .float("mist_start", "Mist Start", 0.0)
            .float("mist_depth", "Mist Depth", 100.0)
            .float("mist_falloff", "Mist Falloff", 1.0)
            .boolean("use_approximate_shadow_catcher", "Approximate Shadow Catcher", false)
            .int("cryptomatte_depth", "Cryptomatte Depth", 0)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::scene("integrator")
            .int("min_bounce", "Min Bounce", 0)
            .int("max_bounce", "Max Bounce", 7)
            .int("max_diffuse_bounce", "Max Diffuse Bounce", 7)
            .int("max_glossy_bounce", "Max Glossy Bounce", 7)
            .int("max_transmission_bounce", "Max Transmission Bounce", 7)
            .int("max_volume_bounce", "Max Volume Bounce", 7)
            .int("transparent_min_bounce", "Transparent Min Bounce", 0)
            .int("transparent_max_bounce", "Transparent Max Bounce", 7)
            .int("ao_bounces", "AO Bounces", 0)
            .float("volume_step_rate", "Volume Step Rate", 1.0)
            .int("volume_max_steps", "Volume Max Steps", 1024)
            .boolean("caustics_reflective", "Reflective Caustics", true)
            .boolean("caustics_refractive", "Refractive Caustics", true)
            .float("filter_glossy", "Filter Glossy", 0.0)
            .int("seed", "Seed", 0)
            .float("sample_clamp_direct", "Sample Clamp Direct", 0.0)
            .float("sample_clamp_indirect", "Sample Clamp Indirect", 10.0)
            .boolean("motion_blur", "Motion Blur", false)
            .int("aa_samples", "AA Samples", 0)
            .enumeration(
                "sampling_pattern",
                "Sampling Pattern",
                EnumDef::sequential(["sobol_burley", "tabulated_sobol"]),
                1,
            )
            .boolean("use_denoise", "Use Denoiser", false)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::scene("background")
            .boolean("use_shader", "Use Shader", true)
            .uint("visibility", "Visibility", !0)
            .boolean("transparent", "Transparent", false)
            .boolean("transparent_glass", "Transparent Glass", false)
            .float("transparent_roughness_threshold", "Transparent Roughness Threshold", 0.0)
            .float("volume_step_size", "Volume Step Size", 0.1)
            .node_ref("shader", "Shader")
            .build(),
    );

    reg.register(
        NodeTypeBuilder::scene("shader")
            .boolean("use_mis", "Use MIS", true)
            .boolean("use_transparent_shadow", "Use Transparent Shadow", true)
            .boolean("heterogeneous_volume", "Heterogeneous Volume", true)
            .enumeration(
                "volume_sampling_method",
                "Volume Sampling Method",
                EnumDef::sequential(["distance", "equiangular", "multiple_importance"]),
                2,
            )
            .enumeration(
                "volume_interpolation_method",
                "Volume Interpolation Method",
                EnumDef::sequential(["linear", "cubic"]),
                0,
            )
            .float("volume_step_rate", "Volume Step Rate", 1.0)
            .enumeration(
                "displacement_method",
                "Displacement Method",
                EnumDef::sequential(["bump", "true", "both"]),
                0,
            )
            .int("pass_id", "Pass ID", 0)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::scene("geometry")
            .abstract_type()
            .transform("tfm", "Transform", Transform::IDENTITY)
            .array("used_shaders", "Shaders", SocketType::NodeArray)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::scene("mesh")
            .transform("tfm", "Transform", Transform::IDENTITY)
            .array("used_shaders", "Shaders", SocketType::NodeArray)
            .array("verts", "Vertices", SocketType::Float3Array)
            .array("triangles", "Triangles", SocketType::IntArray)
            .array("shader", "Shader", SocketType::IntArray)
            .array("smooth", "Smooth", SocketType::BooleanArray)
            .array("vert_offsets", "Vertex Offsets", SocketType::IntArray)
            .array("face_starts", "Face Starts", SocketType::IntArray)
            .enumeration(
                "subdivision_type",
                "Subdivision Type",
                EnumDef::sequential(["none", "linear", "catmull_clark"]),
                0,
            )
            .float("subd_dicing_rate", "Subdivision Dicing Rate", 1.0)
            .int("subd_max_level", "Max Subdivision Level", 1)
            .internal("num_ngons", SocketType::Int)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::scene("hair")
            .transform("tfm", "Transform", Transform::IDENTITY)
            .array("used_shaders", "Shaders", SocketType::NodeArray)
            .array("curve_keys", "Curve Keys", SocketType::Float3Array)
            .array("curve_radius", "Curve Radius", SocketType::FloatArray)
            .array("curve_first_key", "Curve First Key", SocketType::IntArray)
            .array("curve_shader", "Curve Shader", SocketType::IntArray)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::scene("pointcloud")
            .transform("tfm", "Transform", Transform::IDENTITY)
            .array("used_shaders", "Shaders", SocketType::NodeArray)
            .array("points", "Points", SocketType::Float3Array)
            .array("radius", "Radius", SocketType::FloatArray)
            .array("shader", "Shader", SocketType::IntArray)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::scene("volume")
            .transform("tfm", "Transform", Transform::IDENTITY)
            .array("used_shaders", "Shaders", SocketType::NodeArray)
            .array("verts", "Vertices", SocketType::Float3Array)
            .array("triangles", "Triangles", SocketType::IntArray)
            .float("clipping", "Clipping", 0.001)
            .float("step_size", "Step Size", 0.0)
            .boolean("object_space", "Object Space", false)
            .float("velocity_scale", "Velocity Scale", 1.0)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::scene("light")
            .transform("tfm", "Transform", Transform::IDENTITY)
            .array("used_shaders", "Shaders", SocketType::NodeArray)
            .enumeration(
                "light_type",
                "Type",
                EnumDef::sequential(["point", "distant", "background", "area", "spot", "triangle"]),
                0,
            )
            .float3("strength", "Strength", Vec3::ONE)
            .float("size", "Size", 0.0)
            .float("angle", "Angle", 0.0)
            .float("sizeu", "Size U", 1.0)
            .float("sizev", "Size V", 1.0)
            .boolean("ellipse", "Ellipse", false)
            .float("spot_angle", "Spot Angle", std::f32::consts::FRAC_PI_4)
            .float("spot_smooth", "Spot Smooth", 0.0)
            .boolean("cast_shadow", "Cast Shadow", true)
            .boolean("use_mis", "Use Multiple Importance Sampling", false)
            .int("max_bounces", "Max Bounces", 1024)
            .uint("random_id", "Random ID", 0)
            .boolean("is_portal", "Is Portal", false)
            .boolean("is_enabled", "Is Enabled", true)
            .node_ref("shader", "Shader")
            .build(),
    );

    reg.register(
        NodeTypeBuilder::scene("object")
            .node_ref("geometry", "Geometry")
            .transform("tfm", "Transform", Transform::IDENTITY)
            .uint("visibility", "Visibility", !0)
            .float3("color", "Color", Vec3::ZERO)
            .float("alpha", "Alpha", 0.0)
            .uint("random_id", "Random ID", 0)
            .int("pass_id", "Pass ID", 0)
            .boolean("use_holdout", "Use Holdout", false)
            .boolean("hide_on_missing_motion", "Hide on Missing Motion", false)
            .float3("dupli_generated", "Dupli Generated", Vec3::ZERO)
            .float2("dupli_uv", "Dupli UV", Vec2::ZERO)
            .array("motion", "Motion", SocketType::TransformArray)
            .float("shadow_terminator_shading_offset", "Shadow Terminator Shading Offset", 0.0)
            .float("shadow_terminator_geometry_offset", "Shadow Terminator Geometry Offset", 0.1)
            .boolean("is_shadow_catcher", "Shadow Catcher", false)
            .node_ref("particle_system", "Particle System")
            .int("particle_index", "Particle Index", 0)
            .string("asset_name", "Asset Name", "")
            .string("lightgroup", "Light Group", "")
            .uint("receiver_light_set", "Light Set Index", 0)
            .int64("light_set_membership", "Light Set Membership", 0)
            .build(),
    );

    reg.register(
        NodeTypeBuilder::scene("pass")
            .enumeration(
                "type",
                "Type",
                EnumDef::sequential([
                    "none", "combined", "emission", "background", "ao", "shadow", "diffuse",
                    "glossy", "transmission", "volume", "depth", "position", "normal", "roughness",
                    "uv", "object_id", "material_id", "motion", "cryptomatte", "denoising_normal",
                    "denoising_albedo",
                ]),
                1,
            )
            .enumeration("mode", "Mode", EnumDef::sequential(["noisy", "denoised"]), 0)
            .string("name", "Name", "")
            .boolean("include_albedo", "Include Albedo", false)
            .string("lightgroup", "Light Group", "")
            .build(),
    );

    reg.register(
        NodeTypeBuilder::scene("particle_system")
            .array("index", "Index", SocketType::IntArray)
            .array("age", "Age", SocketType::FloatArray)
            .array("lifetime", "Lifetime", SocketType::FloatArray)
            .array("location", "Location", SocketType::Float3Array)
            .array("size", "Size", SocketType::FloatArray)
            .array("velocity", "Velocity", SocketType::Float3Array)
            .array("angular_velocity", "Angular Velocity", SocketType::Float3Array)
            .build(),
    );
}
