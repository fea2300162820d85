//! Shading helpers shared by the reference kernels.
//!
//! Each function has a same-named counterpart in `common.wgsl`.

use glam::{Mat4, Vec2, Vec3, Vec4, Vec3Swizzles, Vec4Swizzles};

pub fn saturate(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

pub fn fract(x: f32) -> f32 {
    x - x.floor()
}

/// Rec. 709 luminance.
pub fn luminance(c: Vec3) -> f32 {
    c.dot(Vec3::new(0.2126, 0.7152, 0.0722))
}

/// Interleaved gradient noise at a pixel coordinate.
pub fn interleaved_gradient_noise(p: Vec2) -> f32 {
    fract(52.982_918_9 * fract(0.067_110_56 * p.x + 0.005_837_15 * p.y))
}

/// Eye index and per-eye UV of a screen UV. Stereo is side by side.
pub fn split_eye(screen_uv: Vec2, eye_count: usize) -> (usize, Vec2) {
    if eye_count < 2 {
        return (0, screen_uv);
    }
    let eye = usize::from(screen_uv.x >= 0.5);
    (eye, Vec2::new(screen_uv.x * 2.0 - eye as f32, screen_uv.y))
}

/// Screen UV of a per-eye UV.
pub fn join_eye(eye: usize, eye_uv: Vec2, eye_count: usize) -> Vec2 {
    if eye_count < 2 {
        return eye_uv;
    }
    Vec2::new((eye_uv.x + eye as f32) * 0.5, eye_uv.y)
}

/// UV origin is top-left with +v down; NDC +y is up.
pub fn uv_to_ndc(uv: Vec2) -> Vec2 {
    Vec2::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0)
}

pub fn ndc_to_uv(ndc: Vec2) -> Vec2 {
    Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5)
}

/// Point reconstructed from a per-eye UV and device depth through `inverse`.
pub fn unproject(eye_uv: Vec2, depth: f32, inverse: &Mat4) -> Vec3 {
    let ndc = uv_to_ndc(eye_uv);
    let p = *inverse * Vec4::new(ndc.x, ndc.y, depth, 1.0);
    p.xyz() / p.w
}

/// Per-eye UV and device depth of a point through `projection`.
pub fn project(p: Vec3, projection: &Mat4) -> (Vec2, f32) {
    let clip = *projection * p.extend(1.0);
    let ndc = clip.xyz() / clip.w;
    (ndc_to_uv(ndc.xy()), ndc.z)
}

/// World normal from a G-buffer texel (`rgb = n * 0.5 + 0.5`).
pub fn decode_normal(texel: Vec4) -> Vec3 {
    (texel.xyz() * 2.0 - Vec3::ONE).normalize_or_zero()
}

pub fn to_view_normal(world_normal: Vec3, world_to_camera: &Mat4) -> Vec3 {
    world_to_camera
        .transform_vector3(world_normal)
        .normalize_or_zero()
}

pub fn reflect(d: Vec3, n: Vec3) -> Vec3 {
    d - 2.0 * d.dot(n) * n
}

/// Orthonormal tangent and bitangent for a unit normal.
pub fn tangent_basis(n: Vec3) -> (Vec3, Vec3) {
    let sign = if n.z >= 0.0 { 1.0 } else { -1.0 };
    let a = -1.0 / (sign + n.z);
    let b = n.x * n.y * a;
    (
        Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x),
        Vec3::new(b, sign + n.y * n.y * a, -n.y),
    )
}
