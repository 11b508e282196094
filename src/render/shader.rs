/// Metallic/roughness shading with one ambient and one directional light.
///
/// Output is linear; the surface format takes care of the sRGB encode.
pub(crate) const SHADER: &str = r#"
const PI: f32 = 3.14159265;

struct GlobalUniform {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    light_direction: vec4<f32>,
    light_color: vec4<f32>,
    ambient_color: vec4<f32>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    color: vec4<f32>,
    // x: metalness, y: roughness
    material: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;

@group(1) @binding(0)
var<uniform> object: ObjectConstants;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;

    let world_normal = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    ) * input.normal;

    out.normal = normalize(world_normal);
    return out;
}

fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    return a2 / (PI * d * d);
}

fn geometry_smith(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    let r = roughness + 1.0;
    let k = r * r / 8.0;
    let view = n_dot_v / (n_dot_v * (1.0 - k) + k);
    let light = n_dot_l / (n_dot_l * (1.0 - k) + k);
    return view * light;
}

fn fresnel_schlick(cos_theta: f32, f0: vec3<f32>) -> vec3<f32> {
    return f0 + (vec3<f32>(1.0) - f0) * pow(1.0 - cos_theta, 5.0);
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let albedo = object.color.rgb;
    let metalness = object.material.x;
    let roughness = clamp(object.material.y, 0.04, 1.0);

    let n = normalize(input.normal);
    let v = normalize(globals.camera_position.xyz - input.world_pos);
    let l = normalize(globals.light_direction.xyz);
    let h = normalize(v + l);

    let n_dot_l = max(dot(n, l), 0.0);
    let n_dot_v = max(dot(n, v), 1e-4);
    let n_dot_h = max(dot(n, h), 0.0);

    let f0 = mix(vec3<f32>(0.04), albedo, metalness);
    let fresnel = fresnel_schlick(max(dot(h, v), 0.0), f0);
    let specular = distribution_ggx(n_dot_h, roughness)
        * geometry_smith(n_dot_v, n_dot_l, roughness)
        * fresnel
        / (4.0 * n_dot_v * max(n_dot_l, 1e-4));
    let diffuse = (vec3<f32>(1.0) - fresnel) * (1.0 - metalness) * albedo;

    let direct = (diffuse + specular * PI) * globals.light_color.rgb * n_dot_l;
    let ambient = globals.ambient_color.rgb * albedo;
    return vec4<f32>(ambient + direct, object.color.a);
}
"#;
