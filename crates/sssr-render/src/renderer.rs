//! Per-frame entry point tying the frame recorder to the wgpu executor.

use sssr_core::{HostFrame, PersistentState, SsrConfig, StochasticReflections};

use crate::error::RenderResult;
use crate::executor::{HostTextures, WgpuExecutor};

/// Stochastic screen-space reflections rendered with wgpu.
#[derive(Debug)]
pub struct SsrRenderer {
    effect: StochasticReflections,
    executor: WgpuExecutor,
}

impl SsrRenderer {
    pub fn new(device: &wgpu::Device, config: SsrConfig) -> Self {
        Self {
            effect: StochasticReflections::new(config),
            executor: WgpuExecutor::new(device),
        }
    }

    pub fn config(&self) -> &SsrConfig {
        self.effect.config()
    }

    pub fn set_config(&mut self, config: SsrConfig) {
        self.effect.set_config(config);
    }

    pub fn state(&self) -> &PersistentState {
        self.effect.state()
    }

    pub fn executor(&self) -> &WgpuExecutor {
        &self.executor
    }

    pub fn reset_history(&mut self) {
        self.effect.reset_history();
    }

    /// Releases every GPU buffer the effect owns.
    pub fn teardown(&mut self) {
        self.effect.teardown();
        self.executor.release_all();
    }

    /// Records the effect into `encoder`.
    ///
    /// Returns `false` when the frame is skipped; the destination is then
    /// left untouched and the host should present scene color itself.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        frame: &HostFrame,
        host: &HostTextures<'_>,
    ) -> RenderResult<bool> {
        let Some(list) = self.effect.record_frame(frame) else {
            return Ok(false);
        };
        self.executor.execute(device, encoder, &list, host)?;
        Ok(true)
    }
}
