//! Texture extents and dispatch sizing.

use glam::{Vec2, Vec4};

use crate::params::QualityFlags;

/// Reduction levels of the depth pyramid above level 0.
pub const MAX_MIN_Z_LEVELS: u32 = 7;
/// Thread-group edge of the per-pixel kernels.
pub const KERNEL_SIZE: u32 = 16;
/// Thread-group edge of the pyramid kernels.
pub const PYRAMID_GROUP_SIZE: u32 = 8;
/// Most color pyramid levels above the base.
pub const MAX_COLOR_LODS: u32 = 12;

/// Width and height of a texture or mip level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Floor-halved extent; either side may reach 0.
    pub fn halved(self) -> Self {
        Self::new(self.width / 2, self.height / 2)
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn texel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// `(w, h, 1/w, 1/h)`, zero reciprocals for an empty side.
    pub fn size_vec4(self) -> Vec4 {
        let rcp = |v: u32| if v == 0 { 0.0 } else { 1.0 / v as f32 };
        Vec4::new(
            self.width as f32,
            self.height as f32,
            rcp(self.width),
            rcp(self.height),
        )
    }

    /// Thread groups covering the extent with square groups of `group_size`.
    pub fn dispatch_groups(self, group_size: u32) -> [u32; 3] {
        [
            self.width.div_ceil(group_size),
            self.height.div_ceil(group_size),
            1,
        ]
    }
}

/// Sizes of depth pyramid levels 0..=n, stopping before a side reaches 0.
pub fn depth_pyramid_levels(screen: Extent) -> Vec<Extent> {
    let mut levels = vec![screen];
    let mut current = screen;
    for _ in 0..MAX_MIN_Z_LEVELS {
        let next = current.halved();
        if next.is_empty() {
            break;
        }
        levels.push(next);
        current = next;
    }
    levels
}

/// Color pyramid levels above the base: `floor(log2(width) - 3)`, capped.
pub fn color_lod_count(width: u32) -> u32 {
    if width == 0 {
        return 0;
    }
    let lods = (width as f32).log2() - 3.0;
    if lods <= 0.0 {
        0
    } else {
        (lods.floor() as u32).min(MAX_COLOR_LODS)
    }
}

/// Sizes of color pyramid levels 1..=n, stopping before a side reaches 0.
pub fn color_pyramid_levels(screen: Extent) -> Vec<Extent> {
    let mut levels = Vec::new();
    let mut current = screen;
    for _ in 0..color_lod_count(screen.width) {
        let next = current.halved();
        if next.is_empty() {
            break;
        }
        levels.push(next);
        current = next;
    }
    levels
}

/// All resolution-dependent sizes of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameExtents {
    pub screen: Extent,
    pub raycast: Extent,
    pub resolve: Extent,
    /// Depth pyramid levels, level 0 first.
    pub depth_levels: Vec<Extent>,
    /// Color pyramid levels above the base.
    pub color_levels: Vec<Extent>,
}

impl FrameExtents {
    pub fn new(screen: Extent, flags: &QualityFlags) -> Self {
        let scaled = |downsample: bool| {
            if downsample {
                Extent::new((screen.width / 2).max(1), (screen.height / 2).max(1))
            } else {
                screen
            }
        };
        Self {
            screen,
            raycast: scaled(flags.raycast_downsample),
            resolve: scaled(flags.resolve_downsample),
            depth_levels: depth_pyramid_levels(screen),
            color_levels: color_pyramid_levels(screen),
        }
    }

    pub fn depth_mip_count(&self) -> u32 {
        self.depth_levels.len() as u32
    }

    /// Mip count of the scratch buffer: the base plus every color level.
    pub fn scratch_mip_count(&self) -> u32 {
        1 + self.color_levels.len() as u32
    }
}
