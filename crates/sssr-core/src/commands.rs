//! Backend-independent description of one frame of GPU work.
//!
//! The recorder turns a frame into a [`CommandList`]; executors walk it in
//! order. Textures are named by [`TextureRef`]: host inputs and outputs,
//! buffers that persist across frames, and per-frame transients that are
//! acquired from and released to a pool.

use std::fmt;

use crate::config::DebugPass;
use crate::error::{Result, SsrError};
use crate::extent::{Extent, FrameExtents, KERNEL_SIZE, PYRAMID_GROUP_SIZE};
use crate::uniforms::FrameUniforms;

/// Textures owned by the host renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostTexture {
    SceneColor,
    Depth,
    GBufferNormalRoughness,
    GBufferSpecular,
    MotionVectors,
    /// Optional; executors bind black when the host has none.
    ProbeReflections,
    Destination,
}

impl HostTexture {
    pub fn name(self) -> &'static str {
        match self {
            HostTexture::SceneColor => "scene_color",
            HostTexture::Depth => "depth",
            HostTexture::GBufferNormalRoughness => "gbuffer_normal_roughness",
            HostTexture::GBufferSpecular => "gbuffer_specular",
            HostTexture::MotionVectors => "motion_vectors",
            HostTexture::ProbeReflections => "probe_reflections",
            HostTexture::Destination => "destination",
        }
    }
}

/// Buffers kept between frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistentTexture {
    /// Pre-reflection color with the color pyramid in its mips.
    Scratch,
    /// Reprojected previous composite for the bounce pass.
    Recursive,
    /// Temporal history at resolve size.
    History,
}

impl PersistentTexture {
    pub fn name(self) -> &'static str {
        match self {
            PersistentTexture::Scratch => "scratch",
            PersistentTexture::Recursive => "recursive",
            PersistentTexture::History => "history",
        }
    }
}

/// Handle of a pool texture valid between its `Acquire` and `Release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransientId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureRef {
    Host(HostTexture),
    Persistent(PersistentTexture),
    Transient(TransientId),
}

impl TextureRef {
    pub fn transient(self) -> Option<TransientId> {
        match self {
            TextureRef::Transient(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for TextureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextureRef::Host(host) => write!(f, "host:{}", host.name()),
            TextureRef::Persistent(p) => write!(f, "persistent:{}", p.name()),
            TextureRef::Transient(id) => write!(f, "transient:{}", id.0),
        }
    }
}

/// Storage formats used by the effect's own textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    R32Float,
    Rg16Float,
    Rgba16Float,
    Rgba32Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub label: &'static str,
    pub extent: Extent,
    pub mip_levels: u32,
    pub format: TexelFormat,
}

impl TextureDesc {
    pub fn new(label: &'static str, extent: Extent, format: TexelFormat) -> Self {
        Self {
            label,
            extent,
            mip_levels: 1,
            format,
        }
    }

    pub fn with_mips(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels.max(1);
        self
    }
}

/// Named resource slots of kernels and full-screen passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Primary input.
    Source,
    /// Primary output of a kernel.
    Result,
    Scene,
    MinDepth,
    CostMap,
    Normal,
    Specular,
    Motion,
    Probe,
    Hits,
    Mask,
    Resolve,
    Reflection,
    History,
}

impl Slot {
    pub fn name(self) -> &'static str {
        match self {
            Slot::Source => "source",
            Slot::Result => "result",
            Slot::Scene => "scene",
            Slot::MinDepth => "min_depth",
            Slot::CostMap => "cost_map",
            Slot::Normal => "normal",
            Slot::Specular => "specular",
            Slot::Motion => "motion",
            Slot::Probe => "probe",
            Slot::Hits => "hits",
            Slot::Mask => "mask",
            Slot::Resolve => "resolve",
            Slot::Reflection => "reflection",
            Slot::History => "history",
        }
    }
}

/// Compute kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    MinDepth,
    GaussianDownsample,
    Raycast,
    Resolve,
    Temporal,
    MedianBlur,
    WideBlur,
}

impl Kernel {
    pub const ALL: [Kernel; 7] = [
        Kernel::MinDepth,
        Kernel::GaussianDownsample,
        Kernel::Raycast,
        Kernel::Resolve,
        Kernel::Temporal,
        Kernel::MedianBlur,
        Kernel::WideBlur,
    ];

    /// Entry point name in the kernel source.
    pub fn name(self) -> &'static str {
        match self {
            Kernel::MinDepth => "min_depth",
            Kernel::GaussianDownsample => "gaussian_downsample",
            Kernel::Raycast => "raycast",
            Kernel::Resolve => "resolve",
            Kernel::Temporal => "temporal",
            Kernel::MedianBlur => "median_blur",
            Kernel::WideBlur => "wide_blur",
        }
    }

    pub fn group_size(self) -> u32 {
        match self {
            Kernel::MinDepth | Kernel::GaussianDownsample => PYRAMID_GROUP_SIZE,
            _ => KERNEL_SIZE,
        }
    }

    pub fn reads(self) -> &'static [Slot] {
        match self {
            Kernel::MinDepth | Kernel::GaussianDownsample | Kernel::MedianBlur => &[Slot::Source],
            Kernel::Raycast => &[Slot::MinDepth, Slot::CostMap, Slot::Normal],
            Kernel::Resolve => &[Slot::Source, Slot::Hits, Slot::Mask, Slot::CostMap, Slot::Normal],
            Kernel::Temporal => &[Slot::Source, Slot::History, Slot::Hits, Slot::Motion],
            Kernel::WideBlur => &[Slot::Source, Slot::MinDepth],
        }
    }

    pub fn writes(self) -> &'static [Slot] {
        match self {
            Kernel::Raycast => &[Slot::Hits, Slot::Mask],
            _ => &[Slot::Result],
        }
    }

    /// Slot whose texture defines the dispatch domain.
    pub fn domain_slot(self) -> Slot {
        self.writes()[0]
    }
}

/// Full-screen passes writing mip 0 of their destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlitPass {
    CopyDepth,
    CostMap,
    RemoveCubemap,
    Recursive,
    Blit,
    Combine,
}

impl BlitPass {
    pub const ALL: [BlitPass; 6] = [
        BlitPass::CopyDepth,
        BlitPass::CostMap,
        BlitPass::RemoveCubemap,
        BlitPass::Recursive,
        BlitPass::Blit,
        BlitPass::Combine,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BlitPass::CopyDepth => "copy_depth",
            BlitPass::CostMap => "cost_map",
            BlitPass::RemoveCubemap => "remove_cubemap",
            BlitPass::Recursive => "recursive",
            BlitPass::Blit => "blit",
            BlitPass::Combine => "combine",
        }
    }

    pub fn reads(self) -> &'static [Slot] {
        match self {
            BlitPass::CopyDepth | BlitPass::Blit => &[Slot::Source],
            BlitPass::CostMap => &[Slot::Source, Slot::Normal],
            BlitPass::RemoveCubemap => &[Slot::Source, Slot::Probe],
            BlitPass::Recursive => &[Slot::Source, Slot::Scene, Slot::Motion],
            BlitPass::Combine => &[
                Slot::Source,
                Slot::Reflection,
                Slot::Mask,
                Slot::Hits,
                Slot::CostMap,
                Slot::MinDepth,
                Slot::Resolve,
                Slot::Normal,
                Slot::Specular,
                Slot::Probe,
            ],
        }
    }
}

/// Textures bound to the slots of one kernel or pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    entries: Vec<(Slot, TextureRef)>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `texture` to `slot`, replacing an earlier binding.
    pub fn with(mut self, slot: Slot, texture: TextureRef) -> Self {
        self.entries.retain(|(s, _)| *s != slot);
        self.entries.push((slot, texture));
        self
    }

    pub fn get(&self, slot: Slot) -> Option<TextureRef> {
        self.entries
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, t)| *t)
    }

    /// The texture in `slot`, or `MissingBinding` naming `owner`.
    pub fn require(&self, owner: &'static str, slot: Slot) -> Result<TextureRef> {
        self.get(slot).ok_or(SsrError::MissingBinding {
            kernel: owner,
            slot: slot.name(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Slot, TextureRef)> {
        self.entries.iter()
    }
}

/// One recorded operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PushDebugGroup(&'static str),
    PopDebugGroup,
    Acquire {
        id: TransientId,
        desc: TextureDesc,
    },
    Release {
        id: TransientId,
    },
    /// Full-screen pass into mip 0 of `destination`.
    Blit {
        pass: BlitPass,
        bindings: Bindings,
        destination: TextureRef,
    },
    Dispatch {
        kernel: Kernel,
        bindings: Bindings,
        groups: [u32; 3],
    },
    /// Copies mip 0 of `source` into mip `mip` of `destination`.
    CopyToMip {
        source: TextureRef,
        destination: TextureRef,
        mip: u32,
    },
    /// Copies mip 0 of `source` into mip 0 of `destination`.
    Copy {
        source: TextureRef,
        destination: TextureRef,
    },
}

impl Command {
    /// Every texture the command reads or writes.
    pub fn textures(&self) -> Vec<TextureRef> {
        match self {
            Command::Blit {
                bindings,
                destination,
                ..
            } => bindings
                .iter()
                .map(|(_, t)| *t)
                .chain(std::iter::once(*destination))
                .collect(),
            Command::Dispatch { bindings, .. } => bindings.iter().map(|(_, t)| *t).collect(),
            Command::CopyToMip {
                source,
                destination,
                ..
            }
            | Command::Copy {
                source,
                destination,
            } => vec![*source, *destination],
            _ => Vec::new(),
        }
    }

    /// Textures the command writes.
    pub fn written(&self) -> Vec<TextureRef> {
        match self {
            Command::Blit { destination, .. }
            | Command::CopyToMip { destination, .. }
            | Command::Copy { destination, .. } => vec![*destination],
            Command::Dispatch {
                kernel, bindings, ..
            } => kernel
                .writes()
                .iter()
                .filter_map(|slot| bindings.get(*slot))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Descriptors of the cross-frame buffers for one resolution and downsample setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistentLayout {
    pub scratch: TextureDesc,
    pub recursive: TextureDesc,
    pub history: TextureDesc,
}

impl PersistentLayout {
    pub fn for_extents(extents: &FrameExtents) -> Self {
        Self {
            scratch: TextureDesc::new("SSR Scratch", extents.screen, TexelFormat::Rgba16Float)
                .with_mips(extents.scratch_mip_count()),
            recursive: TextureDesc::new("SSR Recursive", extents.screen, TexelFormat::Rgba16Float),
            history: TextureDesc::new("SSR History", extents.resolve, TexelFormat::Rgba16Float),
        }
    }

    pub fn desc(&self, texture: PersistentTexture) -> &TextureDesc {
        match texture {
            PersistentTexture::Scratch => &self.scratch,
            PersistentTexture::Recursive => &self.recursive,
            PersistentTexture::History => &self.history,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifetime {
    Live,
    Released,
}

/// The commands of one frame plus the constants they run with.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandList {
    pub uniforms: FrameUniforms,
    pub extents: FrameExtents,
    pub persistent: PersistentLayout,
    pub debug_pass: DebugPass,
    commands: Vec<Command>,
    next_transient: u32,
}

impl CommandList {
    pub fn new(
        uniforms: FrameUniforms,
        extents: FrameExtents,
        persistent: PersistentLayout,
        debug_pass: DebugPass,
    ) -> Self {
        Self {
            uniforms,
            extents,
            persistent,
            debug_pass,
            commands: Vec::new(),
            next_transient: 0,
        }
    }

    pub(crate) fn allocate_transient(&mut self) -> TransientId {
        let id = TransientId(self.next_transient);
        self.next_transient += 1;
        id
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Descriptor of a transient from its `Acquire` command.
    pub fn transient_desc(&self, id: TransientId) -> Option<&TextureDesc> {
        self.commands.iter().find_map(|c| match c {
            Command::Acquire { id: acquired, desc } if *acquired == id => Some(desc),
            _ => None,
        })
    }

    /// Mip 0 extent of any texture the list refers to.
    pub fn extent_of(&self, texture: TextureRef) -> Option<Extent> {
        match texture {
            TextureRef::Host(_) => Some(self.extents.screen),
            TextureRef::Persistent(p) => Some(self.persistent.desc(p).extent),
            TextureRef::Transient(id) => self.transient_desc(id).map(|d| d.extent),
        }
    }

    /// Whether any command writes `texture`.
    pub fn writes(&self, texture: TextureRef) -> bool {
        self.commands.iter().any(|c| c.written().contains(&texture))
    }

    /// Checks transient lifetimes, slot bindings, dispatch coverage and
    /// debug-group nesting.
    pub fn validate(&self) -> Result<()> {
        let mut lifetimes: std::collections::HashMap<TransientId, Lifetime> =
            std::collections::HashMap::new();
        let mut depth = 0_usize;

        for (index, command) in self.commands.iter().enumerate() {
            for texture in command.textures() {
                if let Some(id) = texture.transient() {
                    if lifetimes.get(&id) != Some(&Lifetime::Live) {
                        return Err(SsrError::ResourceLifetime(format!(
                            "command {index} uses transient {} outside its lifetime",
                            id.0
                        )));
                    }
                }
            }

            match command {
                Command::PushDebugGroup(_) => depth += 1,
                Command::PopDebugGroup => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        SsrError::ResourceLifetime(format!(
                            "command {index} pops a debug group that was never pushed"
                        ))
                    })?;
                }
                Command::Acquire { id, .. } => {
                    if lifetimes.insert(*id, Lifetime::Live).is_some() {
                        return Err(SsrError::ResourceLifetime(format!(
                            "transient {} acquired twice",
                            id.0
                        )));
                    }
                }
                Command::Release { id } => {
                    if lifetimes.insert(*id, Lifetime::Released) != Some(Lifetime::Live) {
                        return Err(SsrError::ResourceLifetime(format!(
                            "transient {} released without being live",
                            id.0
                        )));
                    }
                }
                Command::Blit { pass, bindings, .. } => {
                    for slot in pass.reads() {
                        bindings.require(pass.name(), *slot)?;
                    }
                }
                Command::Dispatch {
                    kernel,
                    bindings,
                    groups,
                } => {
                    for slot in kernel.reads().iter().chain(kernel.writes()) {
                        bindings.require(kernel.name(), *slot)?;
                    }
                    let domain = bindings.require(kernel.name(), kernel.domain_slot())?;
                    let extent = self
                        .extent_of(domain)
                        .ok_or_else(|| SsrError::UnknownTexture(domain.to_string()))?;
                    let covered = Extent::new(
                        groups[0] * kernel.group_size(),
                        groups[1] * kernel.group_size(),
                    );
                    if covered.width < extent.width {
                        return Err(SsrError::SizeMismatch {
                            expected: extent.width as usize,
                            actual: covered.width as usize,
                        });
                    }
                    if covered.height < extent.height {
                        return Err(SsrError::SizeMismatch {
                            expected: extent.height as usize,
                            actual: covered.height as usize,
                        });
                    }
                }
                Command::CopyToMip { .. } | Command::Copy { .. } => {}
            }
        }

        if let Some((id, _)) = lifetimes.iter().find(|(_, l)| **l == Lifetime::Live) {
            return Err(SsrError::ResourceLifetime(format!(
                "transient {} never released",
                id.0
            )));
        }
        if depth != 0 {
            return Err(SsrError::ResourceLifetime(format!(
                "{depth} debug group(s) left open"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SsrConfig;
    use crate::params::FrameParameters;
    use bytemuck::Zeroable;

    fn empty_list() -> CommandList {
        let params = FrameParameters::from_config(&SsrConfig::default());
        let extents = FrameExtents::new(Extent::new(32, 32), &params.flags);
        let persistent = PersistentLayout::for_extents(&extents);
        CommandList::new(
            FrameUniforms::zeroed(),
            extents,
            persistent,
            DebugPass::Combine,
        )
    }

    fn desc() -> TextureDesc {
        TextureDesc::new("test", Extent::new(32, 32), TexelFormat::Rgba16Float)
    }

    #[test]
    fn test_balanced_list_validates() {
        let mut list = empty_list();
        let id = list.allocate_transient();
        list.push(Command::PushDebugGroup("stage"));
        list.push(Command::Acquire { id, desc: desc() });
        list.push(Command::Dispatch {
            kernel: Kernel::MedianBlur,
            bindings: Bindings::new()
                .with(Slot::Source, TextureRef::Persistent(PersistentTexture::History))
                .with(Slot::Result, TextureRef::Transient(id)),
            groups: [2, 2, 1],
        });
        list.push(Command::Release { id });
        list.push(Command::PopDebugGroup);
        list.validate().unwrap();
        assert!(list.writes(TextureRef::Transient(id)));
        assert!(!list.writes(TextureRef::Persistent(PersistentTexture::History)));
    }

    #[test]
    fn test_use_after_release_is_rejected() {
        let mut list = empty_list();
        let id = list.allocate_transient();
        list.push(Command::Acquire { id, desc: desc() });
        list.push(Command::Release { id });
        list.push(Command::Copy {
            source: TextureRef::Transient(id),
            destination: TextureRef::Persistent(PersistentTexture::History),
        });
        assert!(matches!(list.validate(), Err(SsrError::ResourceLifetime(_))));
    }

    #[test]
    fn test_leak_and_double_release_are_rejected() {
        let mut list = empty_list();
        let id = list.allocate_transient();
        list.push(Command::Acquire { id, desc: desc() });
        assert!(list.validate().is_err());
        list.push(Command::Release { id });
        list.push(Command::Release { id });
        assert!(list.validate().is_err());
    }

    #[test]
    fn test_missing_binding_is_reported() {
        let mut list = empty_list();
        list.push(Command::Dispatch {
            kernel: Kernel::WideBlur,
            bindings: Bindings::new()
                .with(Slot::Source, TextureRef::Persistent(PersistentTexture::History))
                .with(Slot::Result, TextureRef::Persistent(PersistentTexture::Recursive)),
            groups: [2, 2, 1],
        });
        match list.validate() {
            Err(SsrError::MissingBinding { kernel, slot }) => {
                assert_eq!(kernel, "wide_blur");
                assert_eq!(slot, "min_depth");
            }
            other => panic!("expected MissingBinding, got {other:?}"),
        }
    }

    #[test]
    fn test_short_dispatch_is_rejected() {
        let mut list = empty_list();
        list.push(Command::Dispatch {
            kernel: Kernel::MedianBlur,
            bindings: Bindings::new()
                .with(Slot::Source, TextureRef::Persistent(PersistentTexture::History))
                .with(Slot::Result, TextureRef::Persistent(PersistentTexture::Recursive)),
            groups: [1, 2, 1],
        });
        assert!(matches!(
            list.validate(),
            Err(SsrError::SizeMismatch {
                expected: 32,
                actual: 16
            })
        ));
    }

    #[test]
    fn test_bindings_replace_slot() {
        let bindings = Bindings::new()
            .with(Slot::Source, TextureRef::Host(HostTexture::Depth))
            .with(Slot::Source, TextureRef::Host(HostTexture::SceneColor));
        assert_eq!(
            bindings.get(Slot::Source),
            Some(TextureRef::Host(HostTexture::SceneColor))
        );
        assert_eq!(bindings.iter().count(), 1);
    }
}
