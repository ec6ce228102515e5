//! Shader program generation and the uniform block
//!
//! The fragment program is generated per tier: the noise octave count is
//! baked in as a loop bound and the detail multipliers as constants, so the
//! medium program does strictly less work per fragment.

use eyeorb_core::{RenderTier, Vec2};

use crate::geometry::segments_for;
use crate::theme::ThemeSnapshot;

/// Vertical field of view of the orb camera
pub const CAMERA_FOV_DEGREES: f32 = 28.0;
/// Distance from the camera to the sphere center
pub const CAMERA_DISTANCE: f32 = 12.5;
pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 50.0;

/// Per-tier program parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaderParams {
    pub fbm_octaves: u32,
    pub iris_detail: f32,
    pub bump_strength: f32,
    pub sphere_segments: u32,
}

impl ShaderParams {
    pub fn for_tier(tier: RenderTier) -> Self {
        match tier {
            RenderTier::High => ShaderParams {
                fbm_octaves: 4,
                iris_detail: 1.0,
                bump_strength: 1.0,
                sphere_segments: segments_for(tier),
            },
            RenderTier::Medium => ShaderParams {
                fbm_octaves: 2,
                iris_detail: 0.65,
                bump_strength: 0.0,
                sphere_segments: segments_for(tier),
            },
        }
    }
}

const UNIFORM_BLOCK: &str = r#"
struct OrbUniforms {
    projection: mat4x4<f32>,
    // time (s), activity, error flash, unused
    params: vec4<f32>,
    // resolution (px), look
    resolution_look: vec4<f32>,
    sclera: vec4<f32>,
    iris_a: vec4<f32>,
    iris_b: vec4<f32>,
    glow: vec4<f32>,
};

@group(0) @binding(0) var<uniform> orb: OrbUniforms;

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) normal_view: vec3<f32>,
    @location(1) view_dir: vec3<f32>,
};
"#;

const VERTEX_BODY: &str = r#"
@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) normal: vec3<f32>) -> VertexOutput {
    // Model is identity and the camera only translates along z
    let mv = vec4<f32>(position + vec3<f32>(0.0, 0.0, -CAMERA_DISTANCE), 1.0);
    var out: VertexOutput;
    out.clip = orb.projection * mv;
    out.normal_view = normalize(normal);
    out.view_dir = normalize(-mv.xyz);
    return out;
}
"#;

const FRAGMENT_BODY: &str = r#"
fn hash12(p: vec2<f32>) -> f32 {
    var p3 = fract(vec3<f32>(p.x, p.y, p.x) * 0.1031);
    p3 = p3 + dot(p3, p3.yzx + 33.33);
    return fract((p3.x + p3.y) * p3.z);
}

fn noise2(p: vec2<f32>) -> f32 {
    let i = floor(p);
    let f = fract(p);
    let a = hash12(i);
    let b = hash12(i + vec2<f32>(1.0, 0.0));
    let c = hash12(i + vec2<f32>(0.0, 1.0));
    let d = hash12(i + vec2<f32>(1.0, 1.0));
    let u = f * f * (3.0 - 2.0 * f);
    return mix(a, b, u.x) + (c - a) * u.y * (1.0 - u.x) + (d - b) * u.x * u.y;
}

fn fbm(p_in: vec2<f32>) -> f32 {
    var p = p_in;
    var value = 0.0;
    var amplitude = 0.5;
    for (var i = 0; i < FBM_OCTAVES; i = i + 1) {
        value = value + amplitude * noise2(p);
        p = p * 2.02 + 17.0;
        amplitude = amplitude * 0.5;
    }
    return value;
}

// 1 inside `inner`, 0 outside `outer`
fn falloff(outer: f32, inner: f32, x: f32) -> f32 {
    return 1.0 - smoothstep(inner, outer, x);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let time = orb.params.x;
    let activity = orb.params.y;
    let flash = clamp(orb.params.z, 0.0, 1.0);
    let look = orb.resolution_look.zw;

    let n = normalize(in.normal_view);
    let v = normalize(in.view_dir);
    let facing = clamp(n.z, 0.0, 1.0);
    let p = n.xy;

    let iris_center = look * 0.85;
    let r = length(p - iris_center);
    let iris_radius = 0.50;
    let iris_edge = 0.03;

    let iris_mask = falloff(iris_radius, iris_radius - iris_edge, r) * smoothstep(0.05, 0.22, facing);

    let pupil_radius = mix(0.155, 0.125, activity);
    let pupil_soft = 0.025;

    let iris_noise = fbm((p - iris_center) * (7.0 * IRIS_DETAIL) + time * 0.06);
    let pupil_warp = (iris_noise - 0.5) * (0.018 * IRIS_DETAIL);
    let pupil_mask = falloff(pupil_radius, pupil_radius - pupil_soft, r + pupil_warp) * iris_mask;

    let rings = sin((r * 18.0 + iris_noise * 1.4) * 12.0);
    var iris_color = mix(orb.iris_a.rgb, orb.iris_b.rgb, 0.5 + 0.5 * rings);
    let iris_inner = falloff(iris_radius, pupil_radius * 1.1, r);
    iris_color = iris_color * mix(1.18, 0.62, iris_inner);

    let sclera_noise = fbm(p * 2.2 + vec2<f32>(11.0, -7.0));
    let sclera = orb.sclera.rgb * (0.92 + 0.08 * sclera_noise);

    let bump = (fbm(p * 6.0 + time * 0.02) - 0.5) * (0.06 * BUMP_STRENGTH);
    let n_bumped = normalize(vec3<f32>(n.xy + bump * 0.25, n.z));

    var color = mix(sclera, iris_color, iris_mask);
    color = mix(color, vec3<f32>(0.0), pupil_mask);

    let light_dir = normalize(vec3<f32>(-0.18, 0.42, 0.88));
    let diffuse = clamp(dot(n_bumped, light_dir), 0.0, 1.0);
    color = color * (0.46 + diffuse * 0.58);

    let h = normalize(light_dir + v);
    let n_dot_h = clamp(dot(n_bumped, h), 0.0, 1.0);
    color = color + vec3<f32>(1.0) * (0.10 + activity * 0.08) * pow(n_dot_h, 90.0);
    color = color + vec3<f32>(1.0) * pow(n_dot_h, 220.0) * 0.16;

    let fresnel = pow(1.0 - clamp(dot(n_bumped, v), 0.0, 1.0), 3.0);
    color = color + orb.glow.rgb * fresnel * (0.10 + 0.08 * activity);
    color = color + orb.glow.rgb * (0.025 + 0.02 * activity) * iris_mask;

    // Error pulse: dim, then lift slightly towards white
    color = color * (1.0 - flash * 0.48);
    color = mix(color, vec3<f32>(1.0), flash * 0.10);

    let alpha = pow(smoothstep(0.0, 0.12, facing), 1.35);
    return vec4<f32>(color, alpha);
}
"#;

/// Generated WGSL for one tier, holding both entry points
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderProgram {
    pub tier: RenderTier,
    pub params: ShaderParams,
    pub source: String,
}

impl ShaderProgram {
    pub const VERTEX_ENTRY: &'static str = "vs_main";
    pub const FRAGMENT_ENTRY: &'static str = "fs_main";

    pub fn for_tier(tier: RenderTier) -> Self {
        let params = ShaderParams::for_tier(tier);
        let constants = format!(
            "const FBM_OCTAVES: i32 = {};\nconst IRIS_DETAIL: f32 = {:.3};\nconst BUMP_STRENGTH: f32 = {:.3};\nconst CAMERA_DISTANCE: f32 = {:.3};\n",
            params.fbm_octaves, params.iris_detail, params.bump_strength, CAMERA_DISTANCE,
        );

        let mut source = String::with_capacity(
            constants.len() + UNIFORM_BLOCK.len() + VERTEX_BODY.len() + FRAGMENT_BODY.len(),
        );
        source.push_str(&constants);
        source.push_str(UNIFORM_BLOCK);
        source.push_str(VERTEX_BODY);
        source.push_str(FRAGMENT_BODY);

        ShaderProgram {
            tier,
            params,
            source,
        }
    }
}

/// Floats in the uniform block: one mat4 and six vec4
pub const UNIFORM_FLOATS: usize = 16 + 6 * 4;

/// CPU-side uniform values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uniforms {
    /// Seconds
    pub time: f32,
    /// Drawing buffer size in CSS pixels
    pub resolution: [f32; 2],
    pub look: Vec2,
    pub activity: f32,
    pub error_flash: f32,
    pub sclera: [f32; 4],
    pub iris_a: [f32; 4],
    pub iris_b: [f32; 4],
    pub glow: [f32; 4],
}

impl Uniforms {
    pub fn new(theme: &ThemeSnapshot, activity: f32) -> Self {
        Uniforms {
            time: 0.0,
            resolution: [1.0, 1.0],
            look: Vec2::ZERO,
            activity,
            error_flash: 0.0,
            sclera: theme.sclera().to_vec4(),
            iris_a: theme.accent_primary.to_vec4(),
            iris_b: theme.accent_secondary.to_vec4(),
            glow: theme.glow.to_vec4(),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.resolution[0] / self.resolution[1].max(1.0)
    }

    /// Pack into the WGSL block layout
    pub fn to_block(&self) -> [f32; UNIFORM_FLOATS] {
        let mut block = [0.0; UNIFORM_FLOATS];
        let projection = perspective(CAMERA_FOV_DEGREES, self.aspect(), CAMERA_NEAR, CAMERA_FAR);
        for (col, column) in projection.iter().enumerate() {
            block[col * 4..col * 4 + 4].copy_from_slice(column);
        }
        block[16..20].copy_from_slice(&[self.time, self.activity, self.error_flash, 0.0]);
        block[20..24].copy_from_slice(&[
            self.resolution[0],
            self.resolution[1],
            self.look.x,
            self.look.y,
        ]);
        block[24..28].copy_from_slice(&self.sclera);
        block[28..32].copy_from_slice(&self.iris_a);
        block[32..36].copy_from_slice(&self.iris_b);
        block[36..40].copy_from_slice(&self.glow);
        block
    }
}

/// Right-handed perspective projection with a `[0, 1]` depth range,
/// column-major.
pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> [[f32; 4]; 4] {
    let f = 1.0 / (fov_y_degrees.to_radians() * 0.5).tan();
    let aspect = if aspect > 0.0 && aspect.is_finite() { aspect } else { 1.0 };
    let range = near - far;

    [
        [f / aspect, 0.0, 0.0, 0.0],
        [0.0, f, 0.0, 0.0],
        [0.0, 0.0, far / range, -1.0],
        [0.0, 0.0, near * far / range, 0.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_params() {
        let high = ShaderParams::for_tier(RenderTier::High);
        assert_eq!(high.fbm_octaves, 4);
        assert_eq!(high.iris_detail, 1.0);
        assert_eq!(high.bump_strength, 1.0);
        assert_eq!(high.sphere_segments, 64);

        let medium = ShaderParams::for_tier(RenderTier::Medium);
        assert_eq!(medium.fbm_octaves, 2);
        assert_eq!(medium.iris_detail, 0.65);
        assert_eq!(medium.bump_strength, 0.0);
        assert_eq!(medium.sphere_segments, 48);
    }

    #[test]
    fn test_program_bakes_constants() {
        let high = ShaderProgram::for_tier(RenderTier::High);
        assert!(high.source.contains("const FBM_OCTAVES: i32 = 4;"));
        assert!(high.source.contains("const IRIS_DETAIL: f32 = 1.000;"));

        let medium = ShaderProgram::for_tier(RenderTier::Medium);
        assert!(medium.source.contains("const FBM_OCTAVES: i32 = 2;"));
        assert!(medium.source.contains("const IRIS_DETAIL: f32 = 0.650;"));
        assert!(medium.source.contains("const BUMP_STRENGTH: f32 = 0.000;"));
    }

    #[test]
    fn test_program_has_entry_points() {
        let program = ShaderProgram::for_tier(RenderTier::Medium);
        assert!(program.source.contains("fn vs_main"));
        assert!(program.source.contains("fn fs_main"));
    }

    #[test]
    fn test_block_layout() {
        let theme = ThemeSnapshot::default();
        let mut uniforms = Uniforms::new(&theme, 0.14);
        uniforms.time = 2.5;
        uniforms.error_flash = 0.75;
        uniforms.resolution = [200.0, 100.0];
        uniforms.look = Vec2::new(0.1, -0.2);

        let block = uniforms.to_block();
        assert_eq!(&block[16..20], &[2.5, 0.14, 0.75, 0.0]);
        assert_eq!(&block[20..24], &[200.0, 100.0, 0.1, -0.2]);
        assert_eq!(&block[24..28], &theme.sclera().to_vec4());
        assert_eq!(&block[36..40], &theme.glow.to_vec4());
        // Wide surface: horizontal scale is half the vertical one
        assert!((block[0] * 2.0 - block[5]).abs() < 1e-5);
    }

    #[test]
    fn test_perspective_maps_near_far() {
        let m = perspective(28.0, 1.0, 0.1, 50.0);
        let depth = |z: f32| (m[2][2] * z + m[3][2]) / (m[2][3] * z);

        assert!(depth(-0.1).abs() < 1e-4);
        assert!((depth(-50.0) - 1.0).abs() < 1e-4);
    }
}
