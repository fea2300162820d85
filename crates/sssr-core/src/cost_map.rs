//! Two-channel confidence map: depth-edge estimate and smoothness.

use glam::Vec4;

use crate::commands::{BlitPass, Bindings, Command, HostTexture, Slot, TexelFormat, TextureDesc, TextureRef};
use crate::extent::{Extent, FrameExtents};
use crate::reference::Image;
use crate::scope::ResourceScope;

/// Share of a sample's weight removed on a full depth edge.
pub const EDGE_WEIGHT_FALLOFF: f32 = 0.75;

pub(crate) fn record(frame: &mut ResourceScope<'_>, extents: &FrameExtents) -> TextureRef {
    let cost_map = frame.acquire(TextureDesc::new(
        "SSR Cost Map",
        extents.screen,
        TexelFormat::Rg16Float,
    ));
    let mut stage = frame.stage("Cost Map");
    stage.record(Command::Blit {
        pass: BlitPass::CostMap,
        bindings: Bindings::new()
            .with(Slot::Source, TextureRef::Host(HostTexture::Depth))
            .with(Slot::Normal, TextureRef::Host(HostTexture::GBufferNormalRoughness)),
        destination: cost_map,
    });
    cost_map
}

/// Ray march step budget for a pixel of the given smoothness.
pub fn step_budget(ray_distance: u32, smoothness: f32) -> u32 {
    let scale = 0.25 + 0.75 * smoothness.clamp(0.0, 1.0);
    ((ray_distance as f32 * scale).round() as u32).max(1)
}

/// Resolve weight multiplier for an edge estimate.
pub fn edge_weight(edge: f32) -> f32 {
    1.0 - EDGE_WEIGHT_FALLOFF * edge.clamp(0.0, 1.0)
}

/// Second-difference over first-difference of device depth along both axes.
///
/// An axis with a neighbor outside the image contributes nothing.
pub fn depth_edge(depth: &Image, x: u32, y: u32) -> f32 {
    let extent = depth.extent();
    let center = depth.get(x, y).x;
    if center >= 1.0 {
        return 0.0;
    }
    let mut second = 0.0;
    let mut first = 0.0;
    if x > 0 && x + 1 < extent.width {
        let l = depth.get(x - 1, y).x;
        let r = depth.get(x + 1, y).x;
        second += (l + r - 2.0 * center).abs();
        first += (r - l).abs();
    }
    if y > 0 && y + 1 < extent.height {
        let u = depth.get(x, y - 1).x;
        let d = depth.get(x, y + 1).x;
        second += (u + d - 2.0 * center).abs();
        first += (d - u).abs();
    }
    (second / (first + 1e-6)).clamp(0.0, 1.0)
}

pub fn cost_map(depth: &Image, normal_roughness: &Image, extent: Extent) -> Image {
    Image::from_fn(extent, |x, y| {
        if depth.get(x, y).x >= 1.0 {
            return Vec4::ZERO;
        }
        let smoothness = 1.0 - normal_roughness.get(x, y).w.clamp(0.0, 1.0);
        Vec4::new(depth_edge(depth, x, y), smoothness, 0.0, 0.0)
    })
}
