//! Texel upload and readback for the float formats the effect uses.

use glam::Vec4;
use half::f16;
use sssr_core::Extent;

use crate::error::{RenderError, RenderResult};

fn texel_size(format: wgpu::TextureFormat) -> RenderResult<u32> {
    match format {
        wgpu::TextureFormat::R32Float | wgpu::TextureFormat::Rg16Float => Ok(4),
        wgpu::TextureFormat::Rgba16Float => Ok(8),
        wgpu::TextureFormat::Rgba32Float => Ok(16),
        other => Err(RenderError::UnsupportedFormat(other)),
    }
}

fn encode(format: wgpu::TextureFormat, texel: Vec4, out: &mut Vec<u8>) {
    match format {
        wgpu::TextureFormat::R32Float => out.extend_from_slice(bytemuck::bytes_of(&texel.x)),
        wgpu::TextureFormat::Rg16Float => {
            for c in [texel.x, texel.y] {
                out.extend_from_slice(&f16::from_f32(c).to_le_bytes());
            }
        }
        wgpu::TextureFormat::Rgba16Float => {
            for c in texel.to_array() {
                out.extend_from_slice(&f16::from_f32(c).to_le_bytes());
            }
        }
        _ => out.extend_from_slice(bytemuck::cast_slice(&texel.to_array())),
    }
}

fn decode(format: wgpu::TextureFormat, bytes: &[u8]) -> Vec4 {
    let half_at = |i: usize| f16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]).to_f32();
    let float_at = |i: usize| {
        f32::from_le_bytes([bytes[4 * i], bytes[4 * i + 1], bytes[4 * i + 2], bytes[4 * i + 3]])
    };
    match format {
        wgpu::TextureFormat::R32Float => Vec4::new(float_at(0), 0.0, 0.0, 0.0),
        wgpu::TextureFormat::Rg16Float => Vec4::new(half_at(0), half_at(1), 0.0, 0.0),
        wgpu::TextureFormat::Rgba16Float => Vec4::new(half_at(0), half_at(1), half_at(2), half_at(3)),
        _ => Vec4::new(float_at(0), float_at(1), float_at(2), float_at(3)),
    }
}

/// Creates a single-mip texture filled with `texels` in row-major order.
pub fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    extent: Extent,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
    texels: &[Vec4],
) -> RenderResult<wgpu::Texture> {
    let size = texel_size(format)?;
    if texels.len() != extent.texel_count() {
        return Err(sssr_core::SsrError::SizeMismatch {
            expected: extent.texel_count(),
            actual: texels.len(),
        }
        .into());
    }
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: extent.width,
            height: extent.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: usage | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let mut bytes = Vec::with_capacity(texels.len() * size as usize);
    for texel in texels {
        encode(format, *texel, &mut bytes);
    }
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &bytes,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(extent.width * size),
            rows_per_image: Some(extent.height),
        },
        wgpu::Extent3d {
            width: extent.width,
            height: extent.height,
            depth_or_array_layers: 1,
        },
    );
    Ok(texture)
}

fn aligned_bytes_per_row(width: u32, texel: u32) -> u32 {
    let unaligned = width * texel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unaligned.div_ceil(align) * align
}

/// Reads mip `mip` of `texture` back to the CPU. Blocks until the GPU is idle.
pub fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    mip: u32,
) -> RenderResult<Vec<Vec4>> {
    let format = texture.format();
    let size = texel_size(format)?;
    let width = (texture.width() >> mip).max(1);
    let height = (texture.height() >> mip).max(1);
    let bytes_per_row = aligned_bytes_per_row(width, size);

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("SSR readback buffer"),
        size: u64::from(bytes_per_row) * u64::from(height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("SSR readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: mip,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::PollType::wait_indefinitely());
    rx.recv()
        .map_err(|_| RenderError::BufferMapFailed)?
        .map_err(|_| RenderError::BufferMapFailed)?;

    let data = slice.get_mapped_range();
    let mut texels = Vec::with_capacity((width * height) as usize);
    for row in 0..height {
        let start = (row * bytes_per_row) as usize;
        for x in 0..width {
            let offset = start + (x * size) as usize;
            texels.push(decode(format, &data[offset..offset + size as usize]));
        }
    }
    drop(data);
    buffer.unmap();
    Ok(texels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_align_to_copy_alignment() {
        assert_eq!(aligned_bytes_per_row(1, 8), 256);
        assert_eq!(aligned_bytes_per_row(32, 8), 256);
        assert_eq!(aligned_bytes_per_row(33, 8), 512);
    }

    #[test]
    fn test_half_texels_decode_what_was_encoded() {
        let texel = Vec4::new(0.5, -2.0, 0.25, 1.0);
        let mut bytes = Vec::new();
        encode(wgpu::TextureFormat::Rgba16Float, texel, &mut bytes);
        assert_eq!(bytes.len(), 8);
        assert_eq!(decode(wgpu::TextureFormat::Rgba16Float, &bytes), texel);
    }

    #[test]
    fn test_unsupported_format_rejected() {
        assert!(texel_size(wgpu::TextureFormat::Rgba8Unorm).is_err());
    }
}
