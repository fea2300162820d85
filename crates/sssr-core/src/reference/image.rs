//! In-memory mipped RGBA float image.

use glam::{Vec2, Vec4};

use crate::error::{Result, SsrError};
use crate::extent::Extent;

/// Mip chain of RGBA texels, mip 0 first.
///
/// Channel count and storage precision of the GPU format are not modelled;
/// unused channels are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    extents: Vec<Extent>,
    mips: Vec<Vec<Vec4>>,
}

fn mip_extent(base: Extent, level: u32) -> Extent {
    Extent::new((base.width >> level).max(1), (base.height >> level).max(1))
}

impl Image {
    /// Zero-filled image with `mip_levels` levels.
    pub fn new(extent: Extent, mip_levels: u32) -> Self {
        let extents: Vec<Extent> = (0..mip_levels.max(1)).map(|l| mip_extent(extent, l)).collect();
        let mips = extents
            .iter()
            .map(|e| vec![Vec4::ZERO; e.texel_count()])
            .collect();
        Self { extents, mips }
    }

    pub fn filled(extent: Extent, value: Vec4) -> Self {
        Self::from_fn(extent, |_, _| value)
    }

    /// Single-level image with texels from `f(x, y)`.
    pub fn from_fn(extent: Extent, f: impl Fn(u32, u32) -> Vec4) -> Self {
        let mut texels = Vec::with_capacity(extent.texel_count());
        for y in 0..extent.height {
            for x in 0..extent.width {
                texels.push(f(x, y));
            }
        }
        Self {
            extents: vec![extent],
            mips: vec![texels],
        }
    }

    pub fn extent(&self) -> Extent {
        self.extents[0]
    }

    pub fn mip_count(&self) -> u32 {
        self.mips.len() as u32
    }

    pub fn mip_extent(&self, level: u32) -> Extent {
        self.extents[self.clamp_level(level)]
    }

    fn clamp_level(&self, level: u32) -> usize {
        (level as usize).min(self.mips.len() - 1)
    }

    /// Texels of one level in row-major order.
    pub fn level(&self, level: u32) -> &[Vec4] {
        &self.mips[self.clamp_level(level)]
    }

    /// Texel at integer coordinates, clamped to the edge.
    pub fn load(&self, level: u32, x: i32, y: i32) -> Vec4 {
        let l = self.clamp_level(level);
        let e = self.extents[l];
        if e.is_empty() {
            return Vec4::ZERO;
        }
        let x = x.clamp(0, e.width as i32 - 1) as usize;
        let y = y.clamp(0, e.height as i32 - 1) as usize;
        self.mips[l][y * e.width as usize + x]
    }

    /// Level-0 texel.
    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        self.load(0, x as i32, y as i32)
    }

    pub fn store(&mut self, level: u32, x: u32, y: u32, value: Vec4) {
        let l = self.clamp_level(level);
        let e = self.extents[l];
        if x < e.width && y < e.height {
            self.mips[l][(y * e.width + x) as usize] = value;
        }
    }

    /// Nearest texel under `uv`.
    pub fn sample_point(&self, level: u32, uv: Vec2) -> Vec4 {
        let e = self.mip_extent(level).as_vec2();
        let p = (uv * e).floor();
        self.load(level, p.x as i32, p.y as i32)
    }

    /// Bilinear sample with texel centers at half-integers, clamped to the edge.
    pub fn sample_bilinear(&self, level: u32, uv: Vec2) -> Vec4 {
        let e = self.mip_extent(level).as_vec2();
        let p = uv * e - Vec2::splat(0.5);
        let base = p.floor();
        let f = p - base;
        let (x, y) = (base.x as i32, base.y as i32);
        let top = self
            .load(level, x, y)
            .lerp(self.load(level, x + 1, y), f.x);
        let bottom = self
            .load(level, x, y + 1)
            .lerp(self.load(level, x + 1, y + 1), f.x);
        top.lerp(bottom, f.y)
    }

    /// Trilinear sample at a fractional level of detail.
    pub fn sample_lod(&self, uv: Vec2, lod: f32) -> Vec4 {
        let lod = lod.clamp(0.0, (self.mip_count() - 1) as f32);
        let lower = lod.floor();
        let a = self.sample_bilinear(lower as u32, uv);
        let t = lod - lower;
        if t <= 0.0 {
            return a;
        }
        a.lerp(self.sample_bilinear(lower as u32 + 1, uv), t)
    }

    /// Copy of one level as a single-level image.
    pub fn level_image(&self, level: u32) -> Image {
        let l = self.clamp_level(level);
        Image {
            extents: vec![self.extents[l]],
            mips: vec![self.mips[l].clone()],
        }
    }

    /// Replaces level `level` with mip 0 of `image`, which must match its size.
    pub fn set_level(&mut self, level: u32, image: &Image) -> Result<()> {
        let l = level as usize;
        if l >= self.mips.len() {
            return Err(SsrError::SizeMismatch {
                expected: self.mips.len(),
                actual: l + 1,
            });
        }
        if self.extents[l] != image.extent() {
            return Err(SsrError::SizeMismatch {
                expected: self.extents[l].texel_count(),
                actual: image.extent().texel_count(),
            });
        }
        self.mips[l].clone_from(&image.mips[0]);
        Ok(())
    }

    /// Largest per-channel absolute difference of level 0.
    pub fn max_abs_diff(&self, other: &Image) -> f32 {
        self.mips[0]
            .iter()
            .zip(&other.mips[0])
            .map(|(a, b)| (*a - *b).abs().max_element())
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_extents_floor_halve() {
        let image = Image::new(Extent::new(13, 5), 4);
        assert_eq!(image.mip_extent(1), Extent::new(6, 2));
        assert_eq!(image.mip_extent(3), Extent::new(1, 1));
        assert_eq!(image.level(2).len(), 3);
    }

    #[test]
    fn test_bilinear_hits_texel_centers() {
        let image = Image::from_fn(Extent::new(4, 2), |x, y| Vec4::splat((x + 4 * y) as f32));
        let center = |x: f32, y: f32| Vec2::new((x + 0.5) / 4.0, (y + 0.5) / 2.0);
        assert_eq!(image.sample_bilinear(0, center(2.0, 1.0)), Vec4::splat(6.0));
        assert_eq!(image.sample_bilinear(0, Vec2::new(0.5, 0.25)), Vec4::splat(1.5));
        // Clamped outside.
        assert_eq!(image.sample_bilinear(0, Vec2::new(-1.0, -1.0)), Vec4::ZERO);
        assert_eq!(image.sample_point(0, Vec2::new(0.99, 0.99)), Vec4::splat(7.0));
    }

    #[test]
    fn test_set_level_checks_size() {
        let mut image = Image::new(Extent::new(8, 8), 2);
        let level = Image::filled(Extent::new(4, 4), Vec4::ONE);
        image.set_level(1, &level).unwrap();
        assert_eq!(image.load(1, 3, 3), Vec4::ONE);
        assert!(image.set_level(0, &level).is_err());
        assert!(image.set_level(2, &level).is_err());
    }
}
