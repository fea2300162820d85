//! GPU uniform layout shared by every kernel and full-screen pass.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::camera::{CameraFrame, EyeMatrices, MAX_EYES};
use crate::debug_view::Intermediate;
use crate::extent::FrameExtents;
use crate::params::FrameParameters;

/// Matrices of one eye.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EyeUniforms {
    pub world_to_camera: [[f32; 4]; 4],
    pub camera_to_world: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub inverse_projection: [[f32; 4]; 4],
    pub view_projection: [[f32; 4]; 4],
    pub inverse_view_projection: [[f32; 4]; 4],
    pub previous_view_projection: [[f32; 4]; 4],
}

impl From<&EyeMatrices> for EyeUniforms {
    fn from(eye: &EyeMatrices) -> Self {
        Self {
            world_to_camera: eye.world_to_camera.to_cols_array_2d(),
            camera_to_world: eye.camera_to_world.to_cols_array_2d(),
            projection: eye.projection.to_cols_array_2d(),
            inverse_projection: eye.inverse_projection.to_cols_array_2d(),
            view_projection: eye.view_projection.to_cols_array_2d(),
            inverse_view_projection: eye.inverse_view_projection.to_cols_array_2d(),
            previous_view_projection: eye.previous_view_projection.to_cols_array_2d(),
        }
    }
}

impl EyeUniforms {
    pub fn matrices(&self) -> EyeMatrices {
        EyeMatrices {
            world_to_camera: Mat4::from_cols_array_2d(&self.world_to_camera),
            camera_to_world: Mat4::from_cols_array_2d(&self.camera_to_world),
            projection: Mat4::from_cols_array_2d(&self.projection),
            inverse_projection: Mat4::from_cols_array_2d(&self.inverse_projection),
            view_projection: Mat4::from_cols_array_2d(&self.view_projection),
            inverse_view_projection: Mat4::from_cols_array_2d(&self.inverse_view_projection),
            previous_view_projection: Mat4::from_cols_array_2d(&self.previous_view_projection),
        }
    }
}

/// Per-frame constants. Mirrors `FrameUniforms` in the WGSL kernels.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub eyes: [EyeUniforms; MAX_EYES],
    /// `(w, h, 1/w, 1/h)` of the screen.
    pub screen_size: [f32; 4],
    pub raycast_size: [f32; 4],
    pub resolve_size: [f32; 4],
    /// Halton offset in xy.
    pub jitter: [f32; 4],
    pub zbuffer_params: [f32; 4],
    pub projection_params: [f32; 4],
    pub camera_position: [f32; 4],
    /// thickness, BRDF bias, screen fade size, smoothness range.
    pub ray_params: [f32; 4],
    /// temporal response min, temporal response max, intensity, Fresnel (0 or 1).
    pub blend_params: [f32; 4],
    /// step budget, highest depth level, color mip count, eye count.
    pub counts: [u32; 4],
    /// normalization, history valid, shown intermediate code, mask blur.
    pub switches: [u32; 4],
}

impl FrameUniforms {
    pub fn new(
        params: &FrameParameters,
        camera: &CameraFrame,
        extents: &FrameExtents,
        jitter: Vec2,
        history_valid: bool,
    ) -> Self {
        let flags = &params.flags;
        let color_mips = if flags.use_mip_map {
            extents.scratch_mip_count()
        } else {
            1
        };
        Self {
            eyes: [
                EyeUniforms::from(&camera.eyes[0]),
                EyeUniforms::from(&camera.eyes[1]),
            ],
            screen_size: extents.screen.size_vec4().to_array(),
            raycast_size: extents.raycast.size_vec4().to_array(),
            resolve_size: extents.resolve.size_vec4().to_array(),
            jitter: [jitter.x, jitter.y, 0.0, 0.0],
            zbuffer_params: camera.zbuffer_params().to_array(),
            projection_params: camera.projection_params().to_array(),
            camera_position: camera.position.extend(1.0).to_array(),
            ray_params: [
                params.thickness,
                params.brdf_bias,
                params.screen_fade_size,
                params.smoothness_range,
            ],
            blend_params: [
                params.temporal_response_min,
                params.temporal_response_max,
                params.intensity,
                if flags.use_fresnel { 1.0 } else { 0.0 },
            ],
            counts: [
                params.ray_distance,
                extents.depth_mip_count().saturating_sub(1),
                color_mips,
                camera.eye_count as u32,
            ],
            switches: [
                u32::from(flags.normalization),
                u32::from(history_valid),
                params.debug_pass.view().shown_code(),
                u32::from(flags.blurring),
            ],
        }
    }

    pub fn eye(&self, eye: usize) -> EyeMatrices {
        self.eyes[eye.min(MAX_EYES - 1)].matrices()
    }

    pub fn eye_count(&self) -> usize {
        (self.counts[3] as usize).clamp(1, MAX_EYES)
    }

    pub fn zbuffer(&self) -> Vec4 {
        Vec4::from_array(self.zbuffer_params)
    }

    pub fn camera_position(&self) -> Vec3 {
        Vec4::from_array(self.camera_position).truncate()
    }

    pub fn jitter(&self) -> Vec2 {
        Vec2::new(self.jitter[0], self.jitter[1])
    }

    pub fn thickness(&self) -> f32 {
        self.ray_params[0]
    }

    pub fn brdf_bias(&self) -> f32 {
        self.ray_params[1]
    }

    pub fn screen_fade_size(&self) -> f32 {
        self.ray_params[2]
    }

    pub fn smoothness_range(&self) -> f32 {
        self.ray_params[3]
    }

    pub fn temporal_response(&self) -> (f32, f32) {
        (self.blend_params[0], self.blend_params[1])
    }

    pub fn intensity(&self) -> f32 {
        self.blend_params[2]
    }

    pub fn use_fresnel(&self) -> bool {
        self.blend_params[3] > 0.5
    }

    pub fn step_budget(&self) -> u32 {
        self.counts[0]
    }

    pub fn max_depth_level(&self) -> u32 {
        self.counts[1]
    }

    pub fn color_mip_count(&self) -> u32 {
        self.counts[2].max(1)
    }

    pub fn normalization(&self) -> bool {
        self.switches[0] != 0
    }

    pub fn history_valid(&self) -> bool {
        self.switches[1] != 0
    }

    /// Intermediate the composite shows instead of blending, if any.
    pub fn shown_intermediate(&self) -> Option<Intermediate> {
        Intermediate::from_code(self.switches[2])
    }

    pub fn mask_blur(&self) -> bool {
        self.switches[3] != 0
    }
}
