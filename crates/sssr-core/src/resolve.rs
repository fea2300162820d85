//! Turns sparse ray hits into a reflection image by neighbour reuse.

use glam::{IVec2, Vec2, Vec4, Vec4Swizzles};

use crate::commands::{
    Bindings, Command, HostTexture, Kernel, PersistentTexture, Slot, TexelFormat, TextureDesc,
    TextureRef,
};
use crate::cost_map::edge_weight;
use crate::extent::{Extent, FrameExtents};
use crate::reference::Image;
use crate::scope::ResourceScope;
use crate::uniforms::FrameUniforms;

/// Raycast texels reused by every resolved pixel.
pub const NEIGHBOR_OFFSETS: [IVec2; 4] = [
    IVec2::new(0, 0),
    IVec2::new(1, 0),
    IVec2::new(0, 1),
    IVec2::new(1, 1),
];

pub(crate) fn record(
    frame: &mut ResourceScope<'_>,
    extents: &FrameExtents,
    hits: TextureRef,
    mask: TextureRef,
    cost_map: TextureRef,
) -> TextureRef {
    let resolve = frame.acquire(TextureDesc::new(
        "SSR Resolve",
        extents.resolve,
        TexelFormat::Rgba16Float,
    ));
    let mut stage = frame.stage("Resolve");
    stage.record(Command::Dispatch {
        kernel: Kernel::Resolve,
        bindings: Bindings::new()
            .with(Slot::Source, TextureRef::Persistent(PersistentTexture::Scratch))
            .with(Slot::Hits, hits)
            .with(Slot::Mask, mask)
            .with(Slot::CostMap, cost_map)
            .with(Slot::Normal, TextureRef::Host(HostTexture::GBufferNormalRoughness))
            .with(Slot::Result, resolve),
        groups: extents.resolve.dispatch_groups(Kernel::Resolve.group_size()),
    });
    resolve
}

/// Color pyramid level for a ray footprint in level-0 pixels.
pub fn select_mip(footprint: f32, mip_count: u32) -> f32 {
    let highest = mip_count.saturating_sub(1) as f32;
    footprint.max(1.0).log2().clamp(0.0, highest)
}

pub struct ResolveInputs<'a> {
    /// Scratch color with its pyramid.
    pub color: &'a Image,
    pub hits: &'a Image,
    pub mask: &'a Image,
    pub cost_map: &'a Image,
    pub normal_roughness: &'a Image,
}

/// Premultiplied reflection color and confidence of one resolve texel.
pub fn resolve_texel(inputs: &ResolveInputs<'_>, u: &FrameUniforms, extent: Extent, x: u32, y: u32) -> Vec4 {
    let screen = Vec2::new(u.screen_size[0], u.screen_size[1]);
    let raycast = Vec2::new(u.raycast_size[0], u.raycast_size[1]);
    let uv = (Vec2::new(x as f32, y as f32) + 0.5) / extent.as_vec2();

    let roughness = inputs.normal_roughness.sample_point(0, uv).w.clamp(0.0, 1.0);
    let edge = inputs.cost_map.sample_point(0, uv).x;
    let base = (uv * raycast).floor().as_ivec2();

    let mut color_sum = Vec4::ZERO;
    let mut weight_sum = 0.0;
    for offset in NEIGHBOR_OFFSETS {
        let texel = base + offset;
        let hit = inputs.hits.load(0, texel.x, texel.y);
        if hit.w < 0.5 {
            continue;
        }
        let weight = inputs.mask.load(0, texel.x, texel.y).x * edge_weight(edge);
        let hit_uv = hit.xy();
        let footprint = roughness * ((hit_uv - uv) * screen).length();
        let mip = select_mip(footprint, u.color_mip_count());
        color_sum += inputs.color.sample_lod(hit_uv, mip) * weight;
        weight_sum += weight;
    }

    let count = NEIGHBOR_OFFSETS.len() as f32;
    let confidence = weight_sum / count;
    let rgb = if u.normalization() {
        if weight_sum > 0.0 {
            color_sum.xyz() / weight_sum
        } else {
            glam::Vec3::ZERO
        }
    } else {
        color_sum.xyz() / count
    };
    (rgb * confidence).extend(confidence)
}

pub fn resolve(inputs: &ResolveInputs<'_>, u: &FrameUniforms, extent: Extent) -> Image {
    Image::from_fn(extent, |x, y| resolve_texel(inputs, u, extent, x, y))
}
