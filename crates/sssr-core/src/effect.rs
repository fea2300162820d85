//! Frame recorder of the stochastic screen-space reflection effect.

use crate::camera::{CameraFrame, CameraInput};
use crate::commands::{CommandList, PersistentLayout};
use crate::composite::{self, CompositeSources};
use crate::config::SsrConfig;
use crate::extent::{Extent, FrameExtents};
use crate::gate::{skip_reason, HostCapabilities};
use crate::params::FrameParameters;
use crate::scope::ResourceScope;
use crate::state::PersistentState;
use crate::uniforms::FrameUniforms;
use crate::{color_pyramid, cost_map, denoise, depth_pyramid, raycast, resolve, temporal};

/// Everything the host provides about the frame besides its textures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostFrame {
    pub screen: Extent,
    pub camera: CameraInput,
    pub capabilities: HostCapabilities,
    /// Editor preview cameras get neither temporal accumulation nor bounces.
    pub is_preview_camera: bool,
    /// The host is running interactively.
    pub is_playing: bool,
}

impl HostFrame {
    pub fn new(screen: Extent, camera: CameraInput) -> Self {
        Self {
            screen,
            camera,
            capabilities: HostCapabilities::all(),
            is_preview_camera: false,
            is_playing: true,
        }
    }

    pub fn with_capabilities(mut self, capabilities: HostCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_preview_camera(mut self, is_preview_camera: bool) -> Self {
        self.is_preview_camera = is_preview_camera;
        self
    }

    pub fn with_playing(mut self, is_playing: bool) -> Self {
        self.is_playing = is_playing;
        self
    }
}

/// One effect instance: its settings and the state it carries between frames.
#[derive(Debug, Clone, Default)]
pub struct StochasticReflections {
    config: SsrConfig,
    state: PersistentState,
}

impl StochasticReflections {
    pub fn new(config: SsrConfig) -> Self {
        let mut effect = Self::default();
        effect.set_config(config);
        effect
    }

    pub fn config(&self) -> &SsrConfig {
        &self.config
    }

    /// Replaces the settings. Out-of-range values are logged here, once.
    pub fn set_config(&mut self, config: SsrConfig) {
        if config != self.config {
            let sanitized = FrameParameters::from_config(&config).sanitized_fields(&config);
            if !sanitized.is_empty() {
                log::warn!(
                    "SSR settings out of range, sanitized: {}",
                    sanitized.join(", ")
                );
            }
        }
        self.config = config;
    }

    pub fn state(&self) -> &PersistentState {
        &self.state
    }

    /// Drops temporal history, the carried view-projection and the jitter position.
    pub fn reset_history(&mut self) {
        self.state.reset();
    }

    /// Forgets the persistent buffers; the next frame reallocates them.
    pub fn teardown(&mut self) {
        log::debug!("SSR teardown");
        self.state.reset();
        self.state.layout = None;
    }

    /// Records one frame, or returns `None` when the gate skips it.
    ///
    /// A skipped frame leaves all state untouched.
    pub fn record_frame(&mut self, frame: &HostFrame) -> Option<CommandList> {
        if let Some(reason) = skip_reason(&self.config, &frame.capabilities) {
            log::trace!("SSR skipped: {}", reason.describe());
            return None;
        }
        if frame.screen.is_empty() {
            log::trace!("SSR skipped: empty screen");
            return None;
        }
        log::trace!("SSR recording frame {}", self.state.frame_index);

        let params = FrameParameters::from_config(&self.config);
        let flags = params.flags;
        let view = params.debug_pass.view();
        let extents = FrameExtents::new(frame.screen, &flags);

        let layout = PersistentLayout::for_extents(&extents);
        if self.state.adopt_layout(layout) {
            log::debug!(
                "SSR persistent buffers reallocated: screen {}x{}, resolve {}x{}",
                extents.screen.width,
                extents.screen.height,
                extents.resolve.width,
                extents.resolve.height
            );
        }

        let camera = CameraFrame::new(&frame.camera, self.state.previous_view_projection.as_ref());
        let jitter = self.state.jitter.next_offset();
        let interactive = frame.is_playing && !frame.is_preview_camera;
        let use_temporal = flags.use_temporal && !frame.is_preview_camera;
        let bounce = !view.bypasses_composite && interactive && flags.multiple_bounces;

        let uniforms = FrameUniforms::new(&params, &camera, &extents, jitter, self.state.history_valid);
        let mut list = CommandList::new(uniforms, extents.clone(), layout, params.debug_pass);
        {
            let mut scope = ResourceScope::new(&mut list, "Stochastic Reflections");
            let cost_map = cost_map::record(&mut scope, &extents);
            let min_depth = depth_pyramid::record(&mut scope, &extents);
            composite::record_scratch_source(
                &mut scope,
                view,
                bounce && self.state.scratch_holds_composite,
            );
            let (hits, mask) = raycast::record(&mut scope, &extents, min_depth, cost_map);
            if flags.use_mip_map {
                color_pyramid::record(&mut scope, &extents);
            }
            let resolve = resolve::record(&mut scope, &extents, hits, mask, cost_map);
            let reflection = if use_temporal {
                temporal::record(&mut scope, &extents, resolve, hits, !view.bypasses_composite)
            } else {
                resolve
            };
            if flags.blurring {
                denoise::record(&mut scope, &extents, reflection, min_depth, flags.high_quality_blur);
            }
            composite::record_composite(
                &mut scope,
                &CompositeSources {
                    reflection,
                    resolve,
                    hits,
                    mask,
                    cost_map,
                    min_depth,
                },
                view,
                bounce,
            );
        }

        if view.bypasses_composite {
            // The scratch buffer now holds the scene without probes.
            self.state.scratch_holds_composite = false;
        } else {
            self.state.previous_view_projection = Some(camera.view_projections());
            self.state.history_valid = use_temporal;
            self.state.scratch_holds_composite = bounce;
        }
        self.state.frame_index += 1;
        Some(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{BlitPass, Command, HostTexture, PersistentTexture, TextureRef};
    use crate::config::DebugPass;
    use glam::Vec3;

    fn frame() -> HostFrame {
        HostFrame::new(
            Extent::new(64, 32),
            CameraInput::look_at(Vec3::ZERO, -Vec3::Z, Vec3::Y, 1.0, 2.0, 0.1, 100.0),
        )
    }

    fn blits(list: &CommandList) -> Vec<(BlitPass, TextureRef)> {
        list.commands()
            .iter()
            .filter_map(|c| match c {
                Command::Blit {
                    pass, destination, ..
                } => Some((*pass, *destination)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_gate_skip_leaves_state_untouched() {
        let mut effect = StochasticReflections::new(SsrConfig::default());
        let before = effect.state().clone();
        assert!(effect.record_frame(&frame()).is_none());
        assert_eq!(effect.state(), &before);
    }

    #[test]
    fn test_bounce_uses_recursive_after_first_combine() {
        let mut effect = StochasticReflections::new(SsrConfig::new().with_intensity(1.0));
        let first = effect.record_frame(&frame()).unwrap();
        first.validate().unwrap();
        let scratch = TextureRef::Persistent(PersistentTexture::Scratch);
        let destination = TextureRef::Host(HostTexture::Destination);
        assert!(blits(&first).contains(&(BlitPass::Combine, scratch)));
        assert!(blits(&first).contains(&(BlitPass::Blit, destination)));
        assert!(!blits(&first).iter().any(|(p, _)| *p == BlitPass::Recursive));
        assert!(effect.state().scratch_holds_composite());

        let second = effect.record_frame(&frame()).unwrap();
        assert!(blits(&second).iter().any(|(p, _)| *p == BlitPass::Recursive));
    }

    #[test]
    fn test_preview_camera_disables_temporal_and_bounce() {
        let mut effect = StochasticReflections::new(SsrConfig::new().with_intensity(1.0));
        let list = effect
            .record_frame(&frame().with_preview_camera(true))
            .unwrap();
        list.validate().unwrap();
        assert!(!list.writes(TextureRef::Persistent(PersistentTexture::History)));
        assert_eq!(
            blits(&list).last(),
            Some(&(BlitPass::Combine, TextureRef::Host(HostTexture::Destination)))
        );
        assert!(!effect.state().history_valid());
    }

    #[test]
    fn test_debug_frame_keeps_temporal_state() {
        let mut effect = StochasticReflections::new(SsrConfig::new().with_intensity(1.0));
        effect.record_frame(&frame()).unwrap();
        let previous = *effect.state().previous_view_projection().unwrap();

        effect.set_config(effect.config().clone().with_debug_pass(DebugPass::Resolve));
        let moved = HostFrame {
            camera: CameraInput::look_at(Vec3::X, Vec3::X - Vec3::Z, Vec3::Y, 1.0, 2.0, 0.1, 100.0),
            ..frame()
        };
        let list = effect.record_frame(&moved).unwrap();
        list.validate().unwrap();
        assert!(!list.writes(TextureRef::Persistent(PersistentTexture::History)));
        assert_eq!(effect.state().previous_view_projection(), Some(&previous));
        assert!(effect.state().history_valid());
        assert!(!effect.state().scratch_holds_composite());
        assert_eq!(blits(&list)[2].0, BlitPass::RemoveCubemap);
    }

    #[test]
    fn test_resize_invalidates_history() {
        let mut effect = StochasticReflections::new(SsrConfig::new().with_intensity(1.0));
        effect.record_frame(&frame()).unwrap();
        assert!(effect.state().history_valid());
        let resized = HostFrame {
            screen: Extent::new(32, 32),
            ..frame()
        };
        let list = effect.record_frame(&resized).unwrap();
        assert!(!list.uniforms.history_valid());
    }
}
