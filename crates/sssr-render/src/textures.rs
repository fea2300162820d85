//! GPU textures backing the effect's transient and persistent buffers.

use sssr_core::{Extent, TexelFormat, TextureDesc};

pub fn texture_format(format: TexelFormat) -> wgpu::TextureFormat {
    match format {
        TexelFormat::R32Float => wgpu::TextureFormat::R32Float,
        TexelFormat::Rg16Float => wgpu::TextureFormat::Rg16Float,
        TexelFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
        TexelFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
    }
}

fn usage(format: TexelFormat) -> wgpu::TextureUsages {
    let base = wgpu::TextureUsages::TEXTURE_BINDING
        | wgpu::TextureUsages::RENDER_ATTACHMENT
        | wgpu::TextureUsages::COPY_SRC
        | wgpu::TextureUsages::COPY_DST;
    match format {
        // Not a storage format without extra features; only the cost-map blit writes it.
        TexelFormat::Rg16Float => base,
        _ => base | wgpu::TextureUsages::STORAGE_BINDING,
    }
}

/// A texture with a view over every mip and a view of mip 0 alone.
///
/// Reads bind the full view; render targets and storage writes bind mip 0.
#[derive(Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub full_view: wgpu::TextureView,
    pub mip0_view: wgpu::TextureView,
    pub desc: TextureDesc,
}

impl GpuTexture {
    pub fn new(device: &wgpu::Device, desc: &TextureDesc) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.extent.width.max(1),
                height: desc.extent.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: desc.mip_levels.max(1),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(desc.format),
            usage: usage(desc.format),
            view_formats: &[],
        });
        let full_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mip0_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(desc.label),
            base_mip_level: 0,
            mip_level_count: Some(1),
            ..Default::default()
        });
        Self {
            texture,
            full_view,
            mip0_view,
            desc: *desc,
        }
    }

    pub fn extent(&self) -> Extent {
        self.desc.extent
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        texture_format(self.desc.format)
    }

    /// Whether this texture can stand in for a texture described by `desc`.
    pub fn matches(&self, desc: &TextureDesc) -> bool {
        self.desc.extent == desc.extent
            && self.desc.mip_levels == desc.mip_levels
            && self.desc.format == desc.format
    }
}
