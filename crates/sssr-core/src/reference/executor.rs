//! Interpreter of command lists on [`Image`]s.

use std::collections::HashMap;

use glam::Vec4;

use crate::commands::{
    BlitPass, Bindings, Command, CommandList, HostTexture, Kernel, PersistentLayout,
    PersistentTexture, Slot, TextureRef, TransientId,
};
use crate::error::{Result, SsrError};
use crate::extent::Extent;
use crate::reference::Image;
use crate::uniforms::FrameUniforms;
use crate::{color_pyramid, composite, cost_map, denoise, depth_pyramid, raycast, resolve, temporal};

/// Host textures of one frame, all at screen size.
#[derive(Debug, Clone)]
pub struct HostImages {
    pub scene_color: Image,
    /// Device depth in channel 0.
    pub depth: Image,
    pub gbuffer_normal_roughness: Image,
    pub gbuffer_specular: Image,
    pub motion_vectors: Image,
    pub probe_reflections: Option<Image>,
    pub destination: Image,
}

impl HostImages {
    fn get(&self, texture: HostTexture) -> Option<&Image> {
        match texture {
            HostTexture::SceneColor => Some(&self.scene_color),
            HostTexture::Depth => Some(&self.depth),
            HostTexture::GBufferNormalRoughness => Some(&self.gbuffer_normal_roughness),
            HostTexture::GBufferSpecular => Some(&self.gbuffer_specular),
            HostTexture::MotionVectors => Some(&self.motion_vectors),
            HostTexture::ProbeReflections => self.probe_reflections.as_ref(),
            HostTexture::Destination => Some(&self.destination),
        }
    }
}

/// Owns the persistent buffers and the live transients between commands.
#[derive(Debug)]
pub struct ReferenceExecutor {
    persistent: HashMap<PersistentTexture, Image>,
    transients: HashMap<TransientId, Image>,
    black: Image,
}

impl Default for ReferenceExecutor {
    fn default() -> Self {
        Self {
            persistent: HashMap::new(),
            transients: HashMap::new(),
            black: Image::filled(Extent::new(1, 1), Vec4::ZERO),
        }
    }
}

impl ReferenceExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persistent(&self, texture: PersistentTexture) -> Option<&Image> {
        self.persistent.get(&texture)
    }

    /// Transients acquired and not yet released.
    pub fn live_transients(&self) -> usize {
        self.transients.len()
    }

    /// Drops every buffer.
    pub fn release_all(&mut self) {
        self.persistent.clear();
        self.transients.clear();
    }

    fn ensure_persistent(&mut self, layout: &PersistentLayout) {
        for texture in [
            PersistentTexture::Scratch,
            PersistentTexture::Recursive,
            PersistentTexture::History,
        ] {
            let desc = layout.desc(texture);
            let matches = self.persistent.get(&texture).is_some_and(|image| {
                image.extent() == desc.extent && image.mip_count() == desc.mip_levels
            });
            if !matches {
                log::debug!("reference executor allocating {}", desc.label);
                self.persistent
                    .insert(texture, Image::new(desc.extent, desc.mip_levels));
            }
        }
    }

    fn image<'a>(&'a self, texture: TextureRef, host: &'a HostImages) -> Result<&'a Image> {
        match texture {
            TextureRef::Host(HostTexture::ProbeReflections) => {
                Ok(host.probe_reflections.as_ref().unwrap_or(&self.black))
            }
            TextureRef::Host(h) => host
                .get(h)
                .ok_or_else(|| SsrError::UnknownTexture(texture.to_string())),
            TextureRef::Persistent(p) => self
                .persistent
                .get(&p)
                .ok_or_else(|| SsrError::UnknownTexture(texture.to_string())),
            TextureRef::Transient(id) => self
                .transients
                .get(&id)
                .ok_or_else(|| SsrError::ResourceLifetime(format!("{texture} is not live"))),
        }
    }

    fn slot<'a>(
        &'a self,
        owner: &'static str,
        bindings: &Bindings,
        slot: Slot,
        host: &'a HostImages,
    ) -> Result<&'a Image> {
        self.image(bindings.require(owner, slot)?, host)
    }

    fn write(&mut self, texture: TextureRef, mip: u32, image: &Image, host: &mut HostImages) -> Result<()> {
        let target = match texture {
            TextureRef::Host(HostTexture::Destination) => &mut host.destination,
            TextureRef::Host(_) => {
                return Err(SsrError::UnknownTexture(format!("{texture} is read-only")));
            }
            TextureRef::Persistent(p) => self
                .persistent
                .get_mut(&p)
                .ok_or_else(|| SsrError::UnknownTexture(texture.to_string()))?,
            TextureRef::Transient(id) => self
                .transients
                .get_mut(&id)
                .ok_or_else(|| SsrError::ResourceLifetime(format!("{texture} is not live")))?,
        };
        target.set_level(mip, image)
    }

    fn mip_extent(&self, texture: TextureRef, mip: u32, host: &HostImages) -> Result<Extent> {
        Ok(self.image(texture, host)?.mip_extent(mip))
    }

    fn run_blit(
        &self,
        pass: BlitPass,
        bindings: &Bindings,
        u: &FrameUniforms,
        extent: Extent,
        host: &HostImages,
    ) -> Result<Image> {
        let owner = pass.name();
        let source = self.slot(owner, bindings, Slot::Source, host)?;
        Ok(match pass {
            BlitPass::CopyDepth => depth_pyramid::copy_depth(source, extent),
            BlitPass::CostMap => {
                let normal = self.slot(owner, bindings, Slot::Normal, host)?;
                cost_map::cost_map(source, normal, extent)
            }
            BlitPass::RemoveCubemap => {
                let probe = self.slot(owner, bindings, Slot::Probe, host)?;
                composite::remove_cubemap(source, probe, extent)
            }
            BlitPass::Recursive => composite::recursive(
                source,
                self.slot(owner, bindings, Slot::Scene, host)?,
                self.slot(owner, bindings, Slot::Motion, host)?,
                extent,
            ),
            BlitPass::Blit => composite::blit(source, extent),
            BlitPass::Combine => {
                let inputs = composite::CombineInputs {
                    scene: source,
                    reflection: self.slot(owner, bindings, Slot::Reflection, host)?,
                    mask: self.slot(owner, bindings, Slot::Mask, host)?,
                    hits: self.slot(owner, bindings, Slot::Hits, host)?,
                    cost_map: self.slot(owner, bindings, Slot::CostMap, host)?,
                    min_depth: self.slot(owner, bindings, Slot::MinDepth, host)?,
                    resolve: self.slot(owner, bindings, Slot::Resolve, host)?,
                    normal_roughness: self.slot(owner, bindings, Slot::Normal, host)?,
                    specular: self.slot(owner, bindings, Slot::Specular, host)?,
                    probe: self.slot(owner, bindings, Slot::Probe, host)?,
                };
                composite::combine(&inputs, u, extent)
            }
        })
    }

    fn run_kernel(
        &self,
        kernel: Kernel,
        bindings: &Bindings,
        u: &FrameUniforms,
        host: &HostImages,
    ) -> Result<Vec<(Slot, Image)>> {
        let owner = kernel.name();
        let domain = bindings.require(owner, kernel.domain_slot())?;
        let extent = self.mip_extent(domain, 0, host)?;
        Ok(match kernel {
            Kernel::MinDepth => {
                let source = self.slot(owner, bindings, Slot::Source, host)?;
                vec![(Slot::Result, depth_pyramid::min_reduce(source, extent))]
            }
            Kernel::GaussianDownsample => {
                let source = self.slot(owner, bindings, Slot::Source, host)?;
                vec![(Slot::Result, color_pyramid::gaussian_downsample(source, extent))]
            }
            Kernel::Raycast => {
                let inputs = raycast::RaycastInputs {
                    min_depth: self.slot(owner, bindings, Slot::MinDepth, host)?,
                    cost_map: self.slot(owner, bindings, Slot::CostMap, host)?,
                    normal_roughness: self.slot(owner, bindings, Slot::Normal, host)?,
                };
                let (hits, mask) = raycast::raycast(&inputs, u, extent);
                vec![(Slot::Hits, hits), (Slot::Mask, mask)]
            }
            Kernel::Resolve => {
                let inputs = resolve::ResolveInputs {
                    color: self.slot(owner, bindings, Slot::Source, host)?,
                    hits: self.slot(owner, bindings, Slot::Hits, host)?,
                    mask: self.slot(owner, bindings, Slot::Mask, host)?,
                    cost_map: self.slot(owner, bindings, Slot::CostMap, host)?,
                    normal_roughness: self.slot(owner, bindings, Slot::Normal, host)?,
                };
                vec![(Slot::Result, resolve::resolve(&inputs, u, extent))]
            }
            Kernel::Temporal => {
                let inputs = temporal::TemporalInputs {
                    current: self.slot(owner, bindings, Slot::Source, host)?,
                    history: self.slot(owner, bindings, Slot::History, host)?,
                    hits: self.slot(owner, bindings, Slot::Hits, host)?,
                    motion: self.slot(owner, bindings, Slot::Motion, host)?,
                };
                vec![(Slot::Result, temporal::temporal(&inputs, u, extent))]
            }
            Kernel::MedianBlur => {
                let source = self.slot(owner, bindings, Slot::Source, host)?;
                vec![(Slot::Result, denoise::median_blur(source, extent))]
            }
            Kernel::WideBlur => {
                let source = self.slot(owner, bindings, Slot::Source, host)?;
                let min_depth = self.slot(owner, bindings, Slot::MinDepth, host)?;
                vec![(Slot::Result, denoise::wide_blur(source, min_depth, u, extent))]
            }
        })
    }

    /// Runs every command of `list` in order.
    pub fn execute(&mut self, list: &CommandList, host: &mut HostImages) -> Result<()> {
        self.ensure_persistent(&list.persistent);
        for command in list.commands() {
            match command {
                Command::PushDebugGroup(label) => log::trace!("reference: begin {label}"),
                Command::PopDebugGroup => {}
                Command::Acquire { id, desc } => {
                    if self
                        .transients
                        .insert(*id, Image::new(desc.extent, desc.mip_levels))
                        .is_some()
                    {
                        return Err(SsrError::ResourceLifetime(format!(
                            "transient {} acquired twice",
                            id.0
                        )));
                    }
                }
                Command::Release { id } => {
                    if self.transients.remove(id).is_none() {
                        return Err(SsrError::ResourceLifetime(format!(
                            "transient {} released without being live",
                            id.0
                        )));
                    }
                }
                Command::Blit {
                    pass,
                    bindings,
                    destination,
                } => {
                    let extent = self.mip_extent(*destination, 0, host)?;
                    let image = self.run_blit(*pass, bindings, &list.uniforms, extent, host)?;
                    self.write(*destination, 0, &image, host)?;
                }
                Command::Dispatch {
                    kernel, bindings, ..
                } => {
                    let outputs = self.run_kernel(*kernel, bindings, &list.uniforms, host)?;
                    for (slot, image) in outputs {
                        let target = bindings.require(kernel.name(), slot)?;
                        self.write(target, 0, &image, host)?;
                    }
                }
                Command::CopyToMip {
                    source,
                    destination,
                    mip,
                } => {
                    let image = self.image(*source, host)?.level_image(0);
                    self.write(*destination, *mip, &image, host)?;
                }
                Command::Copy {
                    source,
                    destination,
                } => {
                    let image = self.image(*source, host)?.level_image(0);
                    self.write(*destination, 0, &image, host)?;
                }
            }
        }
        Ok(())
    }
}
