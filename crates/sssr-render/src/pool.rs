//! Reuse of transient textures across frames.
//!
//! Each frame acquires and releases the same set of intermediates, so after
//! the first frame every acquire is served from the pool.

use std::collections::HashMap;

use sssr_core::{TexelFormat, TextureDesc};

use crate::textures::GpuTexture;

/// Frames a released texture may sit unused before it is dropped.
pub const MAX_AGE: u64 = 60;

/// Key for texture pool lookup.
#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
pub struct TextureKey {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub format: TexelFormat,
}

impl TextureKey {
    pub fn from_desc(desc: &TextureDesc) -> Self {
        Self {
            width: desc.extent.width,
            height: desc.extent.height,
            mip_levels: desc.mip_levels,
            format: desc.format,
        }
    }
}

#[derive(Debug)]
struct PooledTexture {
    texture: GpuTexture,
    last_used: u64,
}

/// Pool of released transients, keyed by shape and format.
#[derive(Debug, Default)]
pub struct TexturePool {
    available: HashMap<TextureKey, Vec<PooledTexture>>,
    created: usize,
}

impl TexturePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire a texture from the pool (or create a new one).
    pub fn acquire(&mut self, device: &wgpu::Device, desc: &TextureDesc) -> GpuTexture {
        let key = TextureKey::from_desc(desc);
        if let Some(pooled) = self.available.get_mut(&key).and_then(Vec::pop) {
            log::trace!("reusing pooled texture {key:?} for {}", desc.label);
            return pooled.texture;
        }
        log::debug!("creating pooled texture {key:?} for {}", desc.label);
        self.created += 1;
        GpuTexture::new(device, desc)
    }

    /// Release a texture back to the pool.
    pub fn release(&mut self, texture: GpuTexture, frame: u64) {
        let key = TextureKey::from_desc(&texture.desc);
        self.available.entry(key).or_default().push(PooledTexture {
            texture,
            last_used: frame,
        });
    }

    /// Drops textures that have not been used for [`MAX_AGE`] frames.
    pub fn cleanup_old(&mut self, current_frame: u64) {
        self.available.retain(|_, textures| {
            textures.retain(|t| current_frame.saturating_sub(t.last_used) < MAX_AGE);
            !textures.is_empty()
        });
    }

    /// Textures currently waiting in the pool.
    pub fn available_count(&self) -> usize {
        self.available.values().map(Vec::len).sum()
    }

    /// Textures created since the pool was made.
    pub fn created_count(&self) -> usize {
        self.created
    }

    pub fn clear(&mut self) {
        self.available.clear();
    }
}
