//! Hierarchical minimum-depth pyramid.
//!
//! Level 0 is the device depth copied at screen size. Level k holds the
//! minimum of the 2x2 block of level k-1 under floor halving, so a reduction
//! never reads outside its source.

use glam::Vec4;

use crate::commands::{
    BlitPass, Bindings, Command, HostTexture, Kernel, Slot, TexelFormat, TextureDesc, TextureRef,
};
use crate::extent::{Extent, FrameExtents};
use crate::reference::Image;
use crate::scope::ResourceScope;

/// Records the pyramid build; the pyramid lives in `frame` until the frame ends.
pub(crate) fn record(frame: &mut ResourceScope<'_>, extents: &FrameExtents) -> TextureRef {
    let pyramid = frame.acquire(
        TextureDesc::new("SSR Depth Pyramid", extents.screen, TexelFormat::R32Float)
            .with_mips(extents.depth_mip_count()),
    );

    let mut stage = frame.stage("Depth Pyramid");
    stage.record(Command::Blit {
        pass: BlitPass::CopyDepth,
        bindings: Bindings::new().with(Slot::Source, TextureRef::Host(HostTexture::Depth)),
        destination: pyramid,
    });

    let mut source = pyramid;
    for (mip, extent) in extents.depth_levels.iter().enumerate().skip(1) {
        let level = stage.acquire(TextureDesc::new(
            "SSR Depth Level",
            *extent,
            TexelFormat::R32Float,
        ));
        stage.record(Command::Dispatch {
            kernel: Kernel::MinDepth,
            bindings: Bindings::new()
                .with(Slot::Source, source)
                .with(Slot::Result, level),
            groups: extent.dispatch_groups(Kernel::MinDepth.group_size()),
        });
        stage.record(Command::CopyToMip {
            source: level,
            destination: pyramid,
            mip: mip as u32,
        });
        source = level;
    }
    pyramid
}

/// Device depth in channel 0.
pub fn copy_depth(depth: &Image, extent: Extent) -> Image {
    Image::from_fn(extent, |x, y| Vec4::new(depth.get(x, y).x, 0.0, 0.0, 0.0))
}

/// One reduction level: the minimum of each 2x2 block of mip 0 of `source`.
pub fn min_reduce(source: &Image, extent: Extent) -> Image {
    Image::from_fn(extent, |x, y| {
        let (sx, sy) = (2 * x, 2 * y);
        let d = source
            .get(sx, sy)
            .x
            .min(source.get(sx + 1, sy).x)
            .min(source.get(sx, sy + 1).x)
            .min(source.get(sx + 1, sy + 1).x);
        Vec4::new(d, 0.0, 0.0, 0.0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extent::depth_pyramid_levels;
    use proptest::prelude::*;

    #[test]
    fn test_min_reduce_picks_block_minimum() {
        let depth = Image::from_fn(Extent::new(4, 2), |x, y| {
            Vec4::new([0.9, 0.5, 0.7, 0.8][x as usize] - 0.1 * y as f32, 0.0, 0.0, 0.0)
        });
        let level = min_reduce(&depth, Extent::new(2, 1));
        assert!((level.get(0, 0).x - 0.4).abs() < 1e-6);
        assert!((level.get(1, 0).x - 0.6).abs() < 1e-6);
    }

    proptest! {
        #[test]
        fn reduction_matches_block_minimum(
            width in 1u32..40,
            height in 1u32..40,
            seed in any::<u32>(),
        ) {
            let screen = Extent::new(width, height);
            let depth = Image::from_fn(screen, |x, y| {
                let h = (x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663) ^ seed) % 1000;
                Vec4::new(h as f32 / 1000.0, 0.0, 0.0, 0.0)
            });
            let levels = depth_pyramid_levels(screen);
            let mut previous = copy_depth(&depth, screen);
            for extent in levels.iter().skip(1) {
                let level = min_reduce(&previous, *extent);
                for y in 0..extent.height {
                    for x in 0..extent.width {
                        // Floor halving keeps the whole block inside the source.
                        prop_assert!(2 * x + 1 < previous.extent().width);
                        prop_assert!(2 * y + 1 < previous.extent().height);
                        let expected = [(0, 0), (1, 0), (0, 1), (1, 1)]
                            .iter()
                            .map(|(dx, dy)| previous.get(2 * x + dx, 2 * y + dy).x)
                            .fold(f32::INFINITY, f32::min);
                        prop_assert_eq!(level.get(x, y).x, expected);
                    }
                }
                previous = level;
            }
        }
    }
}
