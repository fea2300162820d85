//! Gaussian mip chain of the pre-reflection color, stored in the scratch mips.

use glam::{Vec2, Vec4};

use crate::commands::{
    Bindings, Command, Kernel, PersistentTexture, Slot, TexelFormat, TextureDesc, TextureRef,
};
use crate::extent::{Extent, FrameExtents};
use crate::reference::Image;
use crate::scope::ResourceScope;

pub(crate) fn record(frame: &mut ResourceScope<'_>, extents: &FrameExtents) {
    let scratch = TextureRef::Persistent(PersistentTexture::Scratch);
    let mut stage = frame.stage("Color Pyramid");
    let mut source = scratch;
    for (i, extent) in extents.color_levels.iter().enumerate() {
        let level = stage.acquire(TextureDesc::new(
            "SSR Color Level",
            *extent,
            TexelFormat::Rgba16Float,
        ));
        stage.record(Command::Dispatch {
            kernel: Kernel::GaussianDownsample,
            bindings: Bindings::new()
                .with(Slot::Source, source)
                .with(Slot::Result, level),
            groups: extent.dispatch_groups(Kernel::GaussianDownsample.group_size()),
        });
        stage.record(Command::CopyToMip {
            source: level,
            destination: scratch,
            mip: i as u32 + 1,
        });
        source = level;
    }
}

const BINOMIAL: [f32; 3] = [0.25, 0.5, 0.25];

/// One level: a 1-2-1 binomial of bilinear taps around each 2x2 source footprint.
pub fn gaussian_downsample(source: &Image, extent: Extent) -> Image {
    let src = source.extent().as_vec2();
    Image::from_fn(extent, |x, y| {
        // Shared corner of the 2x2 footprint, in source UV.
        let center = Vec2::new(2.0 * x as f32 + 1.0, 2.0 * y as f32 + 1.0) / src;
        let mut sum = Vec4::ZERO;
        for (j, wy) in BINOMIAL.iter().enumerate() {
            for (i, wx) in BINOMIAL.iter().enumerate() {
                let offset = Vec2::new(i as f32 - 1.0, j as f32 - 1.0) / src;
                sum += source.sample_bilinear(0, center + offset) * (wx * wy);
            }
        }
        sum
    })
}
