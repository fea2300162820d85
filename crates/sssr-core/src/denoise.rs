//! Edge-aware blur of the reflection buffer.

use glam::{Vec2, Vec4, Vec4Swizzles};

use crate::camera::linear_eye_depth;
use crate::commands::{Bindings, Command, Kernel, Slot, TexelFormat, TextureDesc, TextureRef};
use crate::extent::{Extent, FrameExtents};
use crate::reference::math::luminance;
use crate::reference::Image;
use crate::scope::ResourceScope;
use crate::uniforms::FrameUniforms;

/// Standard deviation of the wide kernel, in texels.
pub const WIDE_SIGMA: f32 = 1.5;
/// Sharpness of the depth-edge weight.
pub const DEPTH_SHARPNESS: f32 = 4.0;

/// Blurs `target` through a transient and copies the result back.
pub(crate) fn record(
    frame: &mut ResourceScope<'_>,
    extents: &FrameExtents,
    target: TextureRef,
    min_depth: TextureRef,
    high_quality: bool,
) {
    let mut stage = frame.stage("Blur");
    let blurred = stage.acquire(TextureDesc::new(
        "SSR Blur",
        extents.resolve,
        TexelFormat::Rgba16Float,
    ));
    let (kernel, bindings) = if high_quality {
        (
            Kernel::WideBlur,
            Bindings::new()
                .with(Slot::Source, target)
                .with(Slot::MinDepth, min_depth)
                .with(Slot::Result, blurred),
        )
    } else {
        (
            Kernel::MedianBlur,
            Bindings::new()
                .with(Slot::Source, target)
                .with(Slot::Result, blurred),
        )
    };
    stage.record(Command::Dispatch {
        kernel,
        bindings,
        groups: extents.resolve.dispatch_groups(kernel.group_size()),
    });
    stage.record(Command::Copy {
        source: blurred,
        destination: target,
    });
}

/// The 3x3 neighbour whose luminance is the median of the nine.
pub fn median_blur(source: &Image, extent: Extent) -> Image {
    Image::from_fn(extent, |x, y| {
        let mut taps = [Vec4::ZERO; 9];
        let mut i = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                taps[i] = source.load(0, x as i32 + dx, y as i32 + dy);
                i += 1;
            }
        }
        taps.sort_by(|a, b| luminance(a.xyz()).total_cmp(&luminance(b.xyz())));
        taps[4]
    })
}

/// 5x5 Gaussian weighted by linear-depth similarity to the center.
pub fn wide_blur(source: &Image, min_depth: &Image, u: &FrameUniforms, extent: Extent) -> Image {
    let zbuffer = u.zbuffer();
    let size = extent.as_vec2();
    let linear_at = |x: i32, y: i32| {
        let uv = (Vec2::new(x as f32, y as f32) + 0.5) / size;
        linear_eye_depth(min_depth.sample_point(0, uv).x, zbuffer)
    };
    Image::from_fn(extent, |x, y| {
        let (x, y) = (x as i32, y as i32);
        let center = linear_at(x, y);
        let mut sum = Vec4::ZERO;
        let mut total = 0.0;
        for dy in -2..=2_i32 {
            for dx in -2..=2_i32 {
                let spatial = (-((dx * dx + dy * dy) as f32) / (2.0 * WIDE_SIGMA * WIDE_SIGMA)).exp();
                let depth = (-(linear_at(x + dx, y + dy) - center).abs() * DEPTH_SHARPNESS / center).exp();
                let w = spatial * depth;
                sum += source.load(0, x + dx, y + dy) * w;
                total += w;
            }
        }
        if total > 0.0 {
            sum / total
        } else {
            source.get(x as u32, y as u32)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraFrame, CameraInput};
    use crate::config::SsrConfig;
    use crate::params::FrameParameters;
    use glam::Vec3;

    #[test]
    fn test_median_removes_firefly() {
        let extent = Extent::new(5, 5);
        let source = Image::from_fn(extent, |x, y| {
            if x == 2 && y == 2 {
                Vec4::new(100.0, 100.0, 100.0, 1.0)
            } else {
                Vec4::new(0.5, 0.5, 0.5, 1.0)
            }
        });
        let out = median_blur(&source, extent);
        assert_eq!(out.get(2, 2), Vec4::new(0.5, 0.5, 0.5, 1.0));
    }

    #[test]
    fn test_wide_blur_keeps_depth_edges() {
        let extent = Extent::new(8, 4);
        let params = FrameParameters::from_config(&SsrConfig::default());
        let camera = CameraFrame::new(
            &CameraInput::look_at(Vec3::ZERO, -Vec3::Z, Vec3::Y, 1.0, 2.0, 0.1, 100.0),
            None,
        );
        let extents = FrameExtents::new(extent, &params.flags);
        let u = FrameUniforms::new(&params, &camera, &extents, Vec2::ZERO, false);

        // Near surface on the left, far surface on the right.
        let depth = Image::from_fn(extent, |x, _| {
            Vec4::new(if x < 4 { 0.5 } else { 0.999 }, 0.0, 0.0, 0.0)
        });
        let source = Image::from_fn(extent, |x, _| Vec4::splat(if x < 4 { 1.0 } else { 0.0 }));
        let out = wide_blur(&source, &depth, &u, extent);
        assert!(out.get(3, 1).x > 0.99);
        assert!(out.get(4, 1).x < 0.02);

        // Flat depth blurs across the color step.
        let flat = Image::filled(extent, Vec4::new(0.5, 0.0, 0.0, 0.0));
        let out = wide_blur(&source, &flat, &u, extent);
        assert!(out.get(3, 1).x < 0.95);
    }
}
