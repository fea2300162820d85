//! State carried between frames by one effect instance.

use glam::Mat4;

use crate::camera::MAX_EYES;
use crate::commands::PersistentLayout;
use crate::jitter::HaltonSequence;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistentState {
    pub(crate) previous_view_projection: Option<[Mat4; MAX_EYES]>,
    pub(crate) jitter: HaltonSequence,
    pub(crate) history_valid: bool,
    pub(crate) scratch_holds_composite: bool,
    pub(crate) layout: Option<PersistentLayout>,
    pub(crate) frame_index: u64,
}

impl PersistentState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-eye view-projection of the last Combine frame.
    pub fn previous_view_projection(&self) -> Option<&[Mat4; MAX_EYES]> {
        self.previous_view_projection.as_ref()
    }

    pub fn jitter_index(&self) -> u32 {
        self.jitter.index()
    }

    /// Whether the history buffer holds last frame's temporal output.
    pub fn history_valid(&self) -> bool {
        self.history_valid
    }

    /// Whether the scratch buffer holds last frame's composite.
    pub fn scratch_holds_composite(&self) -> bool {
        self.scratch_holds_composite
    }

    /// Layout of the persistent buffers as last recorded.
    pub fn layout(&self) -> Option<&PersistentLayout> {
        self.layout.as_ref()
    }

    /// Frames recorded so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Adopts `layout`, invalidating whatever buffers it reallocates.
    ///
    /// Returns true when any buffer changed.
    pub(crate) fn adopt_layout(&mut self, layout: PersistentLayout) -> bool {
        let Some(old) = self.layout else {
            self.layout = Some(layout);
            self.history_valid = false;
            self.scratch_holds_composite = false;
            return true;
        };
        if old == layout {
            return false;
        }
        if old.history != layout.history {
            self.history_valid = false;
        }
        if old.scratch != layout.scratch || old.recursive != layout.recursive {
            self.scratch_holds_composite = false;
        }
        self.layout = Some(layout);
        true
    }

    /// Forgets all temporal data; the next frame starts fresh.
    pub fn reset(&mut self) {
        self.previous_view_projection = None;
        self.jitter.reset();
        self.history_valid = false;
        self.scratch_holds_composite = false;
    }
}
