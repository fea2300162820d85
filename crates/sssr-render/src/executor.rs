//! Records a [`CommandList`] into a wgpu command encoder.

use std::collections::HashMap;

use sssr_core::{
    Bindings, BlitPass, Command, CommandList, Extent, HostTexture, Kernel, PersistentLayout,
    PersistentTexture, Slot, SsrError, TexelFormat, TextureDesc, TextureRef, TransientId,
};
use wgpu::util::DeviceExt;

use crate::error::{RenderError, RenderResult};
use crate::pipelines::SsrPipelines;
use crate::pool::TexturePool;
use crate::textures::GpuTexture;

/// Host-owned views of one frame, all screen sized.
///
/// Depth is device depth in the red channel of a float texture. The
/// destination must allow `RENDER_ATTACHMENT`.
#[derive(Debug, Clone, Copy)]
pub struct HostTextures<'a> {
    pub scene_color: &'a wgpu::TextureView,
    pub depth: &'a wgpu::TextureView,
    pub gbuffer_normal_roughness: &'a wgpu::TextureView,
    pub gbuffer_specular: &'a wgpu::TextureView,
    pub motion_vectors: &'a wgpu::TextureView,
    /// Black when absent.
    pub probe_reflections: Option<&'a wgpu::TextureView>,
    pub destination: &'a wgpu::TextureView,
    pub destination_format: wgpu::TextureFormat,
}

/// Owns pipelines, persistent buffers and the transient pool.
#[derive(Debug)]
pub struct WgpuExecutor {
    pipelines: SsrPipelines,
    pool: TexturePool,
    persistent: HashMap<PersistentTexture, GpuTexture>,
    transients: HashMap<TransientId, GpuTexture>,
    black: GpuTexture,
    frame: u64,
}

impl WgpuExecutor {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            pipelines: SsrPipelines::new(device),
            pool: TexturePool::new(),
            persistent: HashMap::new(),
            transients: HashMap::new(),
            black: GpuTexture::new(
                device,
                &TextureDesc::new("SSR Black", Extent::new(1, 1), TexelFormat::Rgba16Float),
            ),
            frame: 0,
        }
    }

    pub fn persistent(&self, texture: PersistentTexture) -> Option<&GpuTexture> {
        self.persistent.get(&texture)
    }

    pub fn pool(&self) -> &TexturePool {
        &self.pool
    }

    /// Transients acquired and not yet released.
    pub fn live_transients(&self) -> usize {
        self.transients.len()
    }

    /// Drops persistent buffers and pooled transients.
    pub fn release_all(&mut self) {
        self.persistent.clear();
        self.transients.clear();
        self.pool.clear();
    }

    fn ensure_persistent(&mut self, device: &wgpu::Device, layout: &PersistentLayout) {
        for texture in [
            PersistentTexture::Scratch,
            PersistentTexture::Recursive,
            PersistentTexture::History,
        ] {
            let desc = layout.desc(texture);
            if self.persistent.get(&texture).is_some_and(|t| t.matches(&desc)) {
                continue;
            }
            log::debug!(
                "allocating {} {}x{} ({} mips)",
                desc.label,
                desc.extent.width,
                desc.extent.height,
                desc.mip_levels
            );
            self.persistent.insert(texture, GpuTexture::new(device, &desc));
        }
    }

    fn texture(&self, texture: TextureRef) -> RenderResult<&GpuTexture> {
        let found = match texture {
            TextureRef::Persistent(p) => self.persistent.get(&p),
            TextureRef::Transient(id) => self.transients.get(&id),
            TextureRef::Host(_) => None,
        };
        found.ok_or_else(|| RenderError::MissingTexture(texture.to_string()))
    }

    /// View bound for reading: every mip.
    fn read_view<'a>(
        &'a self,
        texture: TextureRef,
        host: &HostTextures<'a>,
    ) -> RenderResult<&'a wgpu::TextureView> {
        match texture {
            TextureRef::Host(h) => Ok(match h {
                HostTexture::SceneColor => host.scene_color,
                HostTexture::Depth => host.depth,
                HostTexture::GBufferNormalRoughness => host.gbuffer_normal_roughness,
                HostTexture::GBufferSpecular => host.gbuffer_specular,
                HostTexture::MotionVectors => host.motion_vectors,
                HostTexture::ProbeReflections => {
                    host.probe_reflections.unwrap_or(&self.black.full_view)
                }
                HostTexture::Destination => {
                    return Err(SsrError::UnknownTexture(format!("{texture} is write-only")).into());
                }
            }),
            _ => Ok(&self.texture(texture)?.full_view),
        }
    }

    /// View bound for writing: mip 0.
    fn write_view<'a>(
        &'a self,
        texture: TextureRef,
        host: &HostTextures<'a>,
    ) -> RenderResult<&'a wgpu::TextureView> {
        match texture {
            TextureRef::Host(HostTexture::Destination) => Ok(host.destination),
            TextureRef::Host(_) => {
                Err(SsrError::UnknownTexture(format!("{texture} is read-only")).into())
            }
            _ => Ok(&self.texture(texture)?.mip0_view),
        }
    }

    fn target_format(&self, texture: TextureRef, host: &HostTextures<'_>) -> RenderResult<wgpu::TextureFormat> {
        match texture {
            TextureRef::Host(HostTexture::Destination) => Ok(host.destination_format),
            _ => Ok(self.texture(texture)?.format()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn bind_group(
        &self,
        device: &wgpu::Device,
        owner: &'static str,
        layout: &wgpu::BindGroupLayout,
        uniforms: &wgpu::Buffer,
        bindings: &Bindings,
        reads: &[Slot],
        writes: &[Slot],
        host: &HostTextures<'_>,
    ) -> RenderResult<wgpu::BindGroup> {
        let mut views = Vec::with_capacity(reads.len() + writes.len());
        for slot in reads {
            views.push(self.read_view(bindings.require(owner, *slot)?, host)?);
        }
        for slot in writes {
            views.push(self.write_view(bindings.require(owner, *slot)?, host)?);
        }
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: uniforms.as_entire_binding(),
        }];
        entries.extend(views.into_iter().enumerate().map(|(i, view)| wgpu::BindGroupEntry {
            binding: i as u32 + 1,
            resource: wgpu::BindingResource::TextureView(view),
        }));
        Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(owner),
            layout,
            entries: &entries,
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn blit(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        uniforms: &wgpu::Buffer,
        pass: BlitPass,
        bindings: &Bindings,
        destination: TextureRef,
        host: &HostTextures<'_>,
    ) -> RenderResult<()> {
        let format = self.target_format(destination, host)?;
        self.pipelines.prepare_blit(device, pass, format)?;

        let layout = self.pipelines.blit_layout(pass)?;
        let bind_group = self.bind_group(
            device,
            pass.name(),
            layout,
            uniforms,
            bindings,
            pass.reads(),
            &[],
            host,
        )?;
        let target = self.write_view(destination, host)?;
        let pipeline = self.pipelines.blit(pass, format)?;

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(pass.name()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..3, 0..1);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        uniforms: &wgpu::Buffer,
        kernel: Kernel,
        bindings: &Bindings,
        groups: [u32; 3],
        host: &HostTextures<'_>,
    ) -> RenderResult<()> {
        let entry = self.pipelines.kernel(kernel)?;
        let bind_group = self.bind_group(
            device,
            kernel.name(),
            &entry.layout,
            uniforms,
            bindings,
            kernel.reads(),
            kernel.writes(),
            host,
        )?;
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(kernel.name()),
            timestamp_writes: None,
        });
        pass.set_pipeline(&entry.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
        Ok(())
    }

    /// Copies mip 0 of `source` into mip `mip` of `destination`.
    fn copy(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        source: TextureRef,
        destination: TextureRef,
        mip: u32,
    ) -> RenderResult<()> {
        let src = self.texture(source)?;
        let dst = self.texture(destination)?;
        let extent = src.extent();
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &src.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &dst.texture,
                mip_level: mip,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width: extent.width,
                height: extent.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    /// Records every command of `list` into `encoder`.
    ///
    /// Transients return to the pool as soon as they are released, so one
    /// texture may serve several transients within a frame.
    pub fn execute(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        list: &CommandList,
        host: &HostTextures<'_>,
    ) -> RenderResult<()> {
        list.validate()?;
        self.ensure_persistent(device, &list.persistent);

        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("SSR Frame Uniforms"),
            contents: bytemuck::bytes_of(&list.uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        for command in list.commands() {
            match command {
                Command::PushDebugGroup(label) => encoder.push_debug_group(label),
                Command::PopDebugGroup => encoder.pop_debug_group(),
                Command::Acquire { id, desc } => {
                    let texture = self.pool.acquire(device, desc);
                    if self.transients.insert(*id, texture).is_some() {
                        return Err(SsrError::ResourceLifetime(format!(
                            "transient {} acquired twice",
                            id.0
                        ))
                        .into());
                    }
                }
                Command::Release { id } => {
                    let texture = self.transients.remove(id).ok_or_else(|| {
                        SsrError::ResourceLifetime(format!(
                            "transient {} released without being live",
                            id.0
                        ))
                    })?;
                    self.pool.release(texture, self.frame);
                }
                Command::Blit {
                    pass,
                    bindings,
                    destination,
                } => self.blit(device, encoder, &uniforms, *pass, bindings, *destination, host)?,
                Command::Dispatch {
                    kernel,
                    bindings,
                    groups,
                } => self.dispatch(device, encoder, &uniforms, *kernel, bindings, *groups, host)?,
                Command::CopyToMip {
                    source,
                    destination,
                    mip,
                } => self.copy(encoder, *source, *destination, *mip)?,
                Command::Copy {
                    source,
                    destination,
                } => self.copy(encoder, *source, *destination, 0)?,
            }
        }

        self.pool.cleanup_old(self.frame);
        self.frame += 1;
        Ok(())
    }
}
