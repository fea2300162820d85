//! Stochastic hierarchical ray march against the minimum-depth pyramid.
//!
//! Each pixel draws one GGX-importance-sampled reflection direction and
//! marches it through the pyramid in level-0 pixel space. Results are a hit
//! buffer (`uv`, device depth, valid) and a confidence mask.

use std::f32::consts::PI;

use glam::{Vec2, Vec3, Vec4};

use crate::camera::linear_eye_depth;
use crate::commands::{Bindings, Command, HostTexture, Kernel, Slot, TexelFormat, TextureDesc, TextureRef};
use crate::cost_map::step_budget;
use crate::extent::{Extent, FrameExtents};
use crate::reference::math::{
    decode_normal, fract, interleaved_gradient_noise, join_eye, project, reflect, split_eye,
    tangent_basis, to_view_normal, unproject,
};
use crate::reference::Image;
use crate::scope::ResourceScope;
use crate::uniforms::FrameUniforms;

/// Share of the thickness a ray may sit in front of the surface and still hit.
pub const FRONT_TOLERANCE: f32 = 0.1;

/// Records the raycast; the hit buffer and mask live until the frame ends.
pub(crate) fn record(
    frame: &mut ResourceScope<'_>,
    extents: &FrameExtents,
    min_depth: TextureRef,
    cost_map: TextureRef,
) -> (TextureRef, TextureRef) {
    let hits = frame.acquire(TextureDesc::new(
        "SSR Raycast Hits",
        extents.raycast,
        TexelFormat::Rgba32Float,
    ));
    let mask = frame.acquire(TextureDesc::new(
        "SSR Raycast Mask",
        extents.raycast,
        TexelFormat::R32Float,
    ));
    let mut stage = frame.stage("Raycast");
    stage.record(Command::Dispatch {
        kernel: Kernel::Raycast,
        bindings: Bindings::new()
            .with(Slot::MinDepth, min_depth)
            .with(Slot::CostMap, cost_map)
            .with(Slot::Normal, TextureRef::Host(HostTexture::GBufferNormalRoughness))
            .with(Slot::Hits, hits)
            .with(Slot::Mask, mask),
        groups: extents.raycast.dispatch_groups(Kernel::Raycast.group_size()),
    });
    (hits, mask)
}

/// Screen-edge fade of a per-eye UV: 0 on the border, 1 beyond half the fade size.
pub fn edge_fade(uv: Vec2, screen_fade_size: f32) -> f32 {
    let band = screen_fade_size * 0.5;
    if band <= 0.0 {
        return 1.0;
    }
    let e = uv.x.min(1.0 - uv.x).min(uv.y).min(1.0 - uv.y);
    (e / band).clamp(0.0, 1.0)
}

/// Edge fade of texel `texel` in a per-eye grid of `size` texels. The outermost
/// texels map to the border, so they always get 0.
pub fn texel_edge_fade(texel: Vec2, size: Vec2, screen_fade_size: f32) -> f32 {
    let coord = |i: f32, n: f32| if n > 1.0 { i / (n - 1.0) } else { 0.5 };
    edge_fade(
        Vec2::new(coord(texel.x, size.x), coord(texel.y, size.y)),
        screen_fade_size,
    )
}

/// Two decorrelated random numbers in [0, 1) for a pixel.
pub fn pixel_random(pixel: Vec2, jitter: Vec2) -> Vec2 {
    Vec2::new(
        fract(interleaved_gradient_noise(pixel) + jitter.x),
        fract(interleaved_gradient_noise(pixel + Vec2::splat(5.588_238)) + jitter.y),
    )
}

/// GGX half vector in tangent space (+Z is the normal).
///
/// `brdf_bias` pulls the sample toward the normal.
pub fn sample_ggx(xi: Vec2, roughness: f32, brdf_bias: f32) -> Vec3 {
    let alpha = roughness * roughness;
    let a2 = alpha * alpha;
    let y = xi.y * (1.0 - brdf_bias);
    let cos_theta = ((1.0 - y) / (1.0 + (a2 - 1.0) * y)).max(0.0).sqrt().min(1.0);
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = 2.0 * PI * xi.x;
    Vec3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta)
}

/// Outcome of one traced pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Screen UV of the hit.
    pub uv: Vec2,
    /// Device depth of the surface hit.
    pub depth: f32,
    /// Linear depth of the ray behind the surface.
    pub delta: f32,
}

/// Ray segment in level-0 pixel space with device depth in z.
struct ScreenRay {
    origin: Vec3,
    direction: Vec3,
    /// Per-eye viewport in level-0 pixels: min x, max x, height.
    x_min: f32,
    x_max: f32,
    height: f32,
}

fn march(
    ray: &ScreenRay,
    min_depth: &Image,
    max_level: u32,
    budget: u32,
    thickness: f32,
    zbuffer: Vec4,
) -> Option<(Vec3, f32)> {
    let d = ray.direction;
    let o = ray.origin;
    let length = d.x.abs().max(d.y.abs());
    if length < 1e-3 {
        return None;
    }
    let texel = 1.0 / length;
    let nudge = texel * 0.01;
    let mut t = texel;
    let mut level = 0_u32;

    for _ in 0..budget {
        if t > 1.0 {
            return None;
        }
        let pos = o + d * t;
        if pos.x < ray.x_min || pos.x >= ray.x_max || pos.y < 0.0 || pos.y >= ray.height {
            return None;
        }

        let cell_size = (1_u32 << level) as f32;
        let level_extent = min_depth.mip_extent(level);
        let cx = ((pos.x / cell_size).floor() as i32).clamp(0, level_extent.width as i32 - 1);
        let cy = ((pos.y / cell_size).floor() as i32).clamp(0, level_extent.height as i32 - 1);
        let min_z = min_depth.load(level, cx, cy).x;

        let exit = |p: f32, dir: f32, cell: i32| {
            if dir > 0.0 {
                ((cell + 1) as f32 * cell_size - p) / dir
            } else if dir < 0.0 {
                (cell as f32 * cell_size - p) / dir
            } else {
                f32::INFINITY
            }
        };
        let t_exit = exit(o.x, d.x, cx).min(exit(o.y, d.y, cy)).max(t);
        let z_start = o.z + d.z * t;
        let z_end = o.z + d.z * t_exit.min(1.0);

        if z_start.max(z_end) < min_z {
            t = t_exit + nudge;
            level = (level + 1).min(max_level);
        } else if level > 0 {
            level -= 1;
        } else {
            let t_hit = if d.z > 0.0 {
                t.max((min_z - o.z) / d.z)
            } else {
                t
            };
            let hit = o + d * t_hit;
            let delta = linear_eye_depth(hit.z, zbuffer) - linear_eye_depth(min_z, zbuffer);
            let surface = min_z < 1.0;
            if surface && delta >= -thickness * FRONT_TOLERANCE && delta <= thickness {
                return Some((Vec3::new(hit.x, hit.y, min_z), delta));
            }
            t = t_exit + nudge;
        }
    }
    None
}

/// Coarsest pyramid level the march may ascend to: the last one built.
fn top_level(u: &FrameUniforms, min_depth: &Image) -> u32 {
    u.max_depth_level().min(min_depth.mip_count().saturating_sub(1))
}

/// Textures the raycast reads.
pub struct RaycastInputs<'a> {
    pub min_depth: &'a Image,
    pub cost_map: &'a Image,
    pub normal_roughness: &'a Image,
}

/// Traces the ray of raycast texel `(x, y)`.
pub fn trace(inputs: &RaycastInputs<'_>, u: &FrameUniforms, extent: Extent, x: u32, y: u32) -> Option<RayHit> {
    let screen = Extent::new(u.screen_size[0] as u32, u.screen_size[1] as u32);
    let screen_px = screen.as_vec2();
    let uv = (Vec2::new(x as f32, y as f32) + 0.5) / extent.as_vec2();

    let depth = inputs.min_depth.sample_point(0, uv).x;
    if depth >= 1.0 {
        return None;
    }
    let gbuffer = inputs.normal_roughness.sample_point(0, uv);
    let roughness = gbuffer.w.clamp(0.0, 1.0);
    if roughness > u.smoothness_range() {
        return None;
    }

    let eye_count = u.eye_count();
    let (eye, eye_uv) = split_eye(uv, eye_count);
    let matrices = u.eye(eye);
    let p = unproject(eye_uv, depth, &matrices.inverse_projection);
    let n = to_view_normal(decode_normal(gbuffer), &matrices.world_to_camera);
    let view_dir = p.normalize_or_zero();

    let xi = pixel_random(Vec2::new(x as f32, y as f32), u.jitter());
    let h = sample_ggx(xi, roughness, u.brdf_bias());
    let (tangent, bitangent) = tangent_basis(n);
    let h = (tangent * h.x + bitangent * h.y + n * h.z).normalize_or_zero();
    let mut r = reflect(view_dir, h);
    if r.dot(n) <= 0.0 {
        r = reflect(view_dir, n);
    }

    let near = u.projection_params[1];
    let far = u.projection_params[2];
    let mut length = far;
    let end_z = p.z + r.z * length;
    if end_z > -near && r.z > 0.0 {
        length = (-near - p.z) / r.z;
    }
    let end = p + r * length;

    let to_pixels = |q: Vec3| {
        let (q_uv, q_depth) = project(q, &matrices.projection);
        let screen_uv = join_eye(eye, q_uv, eye_count);
        (screen_uv * screen_px).extend(q_depth)
    };
    let origin = to_pixels(p);
    let eye_width = screen_px.x / eye_count as f32;
    let ray = ScreenRay {
        origin,
        direction: to_pixels(end) - origin,
        x_min: eye_width * eye as f32,
        x_max: eye_width * (eye as f32 + 1.0),
        height: screen_px.y,
    };

    let smoothness = inputs.cost_map.sample_point(0, uv).y;
    let budget = step_budget(u.step_budget(), smoothness);
    let (hit, delta) = march(
        &ray,
        inputs.min_depth,
        top_level(u, inputs.min_depth),
        budget,
        u.thickness(),
        u.zbuffer(),
    )?;
    Some(RayHit {
        uv: hit.truncate() / screen_px,
        depth: hit.z,
        delta,
    })
}

/// Confidence of a hit traced from a texel whose own edge fade is `texel_fade`.
pub fn hit_mask(
    hit: &RayHit,
    texel_fade: f32,
    thickness: f32,
    screen_fade_size: f32,
    eye_count: usize,
) -> f32 {
    let (_, eye_uv) = split_eye(hit.uv, eye_count);
    let depth_fade = if thickness > 0.0 {
        1.0 - (hit.delta / thickness).clamp(0.0, 1.0)
    } else {
        1.0
    };
    texel_fade * edge_fade(eye_uv, screen_fade_size) * depth_fade
}

/// Hit buffer and mask over the raycast extent.
pub fn raycast(inputs: &RaycastInputs<'_>, u: &FrameUniforms, extent: Extent) -> (Image, Image) {
    let mut hits = Image::new(extent, 1);
    let mut mask = Image::new(extent, 1);
    let eye_count = u.eye_count();
    let eye_size = Vec2::new(extent.width as f32 / eye_count as f32, extent.height as f32);
    for y in 0..extent.height {
        for x in 0..extent.width {
            if let Some(hit) = trace(inputs, u, extent, x, y) {
                hits.store(0, x, y, Vec4::new(hit.uv.x, hit.uv.y, hit.depth, 1.0));
                let uv = (Vec2::new(x as f32, y as f32) + 0.5) / extent.as_vec2();
                let (eye, _) = split_eye(uv, eye_count);
                let local = Vec2::new(x as f32 - eye as f32 * eye_size.x, y as f32);
                let texel_fade = texel_edge_fade(local, eye_size, u.screen_fade_size());
                let m = hit_mask(&hit, texel_fade, u.thickness(), u.screen_fade_size(), eye_count);
                mask.store(0, x, y, Vec4::new(m, 0.0, 0.0, 0.0));
            }
        }
    }
    (hits, mask)
}
