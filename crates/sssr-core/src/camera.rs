//! Per-frame camera matrices for one or two eyes.

use glam::{Mat4, Vec3, Vec4};

/// Number of eye slots carried through the pipeline.
pub const MAX_EYES: usize = 2;

/// View and projection of one eye as supplied by the host.
///
/// The projection maps view space (right-handed, -Z forward) to device depth
/// in [0, 1] with 0 at the near plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeView {
    pub world_to_camera: Mat4,
    pub projection: Mat4,
}

impl Default for EyeView {
    fn default() -> Self {
        Self {
            world_to_camera: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

/// Active camera of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraInput {
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
    pub eyes: [EyeView; MAX_EYES],
    /// 1 for mono, 2 for side-by-side stereo.
    pub eye_count: usize,
}

impl CameraInput {
    pub fn mono(position: Vec3, eye: EyeView, near: f32, far: f32) -> Self {
        Self {
            position,
            near,
            far,
            eyes: [eye, eye],
            eye_count: 1,
        }
    }

    pub fn stereo(position: Vec3, left: EyeView, right: EyeView, near: f32, far: f32) -> Self {
        Self {
            position,
            near,
            far,
            eyes: [left, right],
            eye_count: 2,
        }
    }

    /// Mono camera looking at `target`, with a [0, 1] depth perspective projection.
    pub fn look_at(
        position: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let eye = EyeView {
            world_to_camera: Mat4::look_at_rh(position, target, up),
            projection: Mat4::perspective_rh(fov_y, aspect, near, far),
        };
        Self::mono(position, eye, near, far)
    }
}

/// Derived matrices of one eye.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeMatrices {
    pub world_to_camera: Mat4,
    /// Camera-to-world with the Z axis flipped, so camera +Z maps to the view direction.
    pub camera_to_world: Mat4,
    pub projection: Mat4,
    pub inverse_projection: Mat4,
    pub view_projection: Mat4,
    pub inverse_view_projection: Mat4,
    /// View-projection of the same eye in the previous frame.
    pub previous_view_projection: Mat4,
}

impl EyeMatrices {
    fn new(eye: &EyeView, previous_view_projection: Mat4) -> Self {
        let view_projection = eye.projection * eye.world_to_camera;
        let mut camera_to_world = eye.world_to_camera.inverse();
        camera_to_world.z_axis = -camera_to_world.z_axis;
        Self {
            world_to_camera: eye.world_to_camera,
            camera_to_world,
            projection: eye.projection,
            inverse_projection: eye.projection.inverse(),
            view_projection,
            inverse_view_projection: view_projection.inverse(),
            previous_view_projection,
        }
    }
}

/// The camera matrices of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    pub eyes: [EyeMatrices; MAX_EYES],
    pub eye_count: usize,
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
}

impl CameraFrame {
    /// Computes the frame matrices.
    ///
    /// `previous` is the per-eye view-projection carried from the last frame;
    /// `None` on the first frame, where the current matrices stand in.
    pub fn new(input: &CameraInput, previous: Option<&[Mat4; MAX_EYES]>) -> Self {
        let eye_count = input.eye_count.clamp(1, MAX_EYES);
        let eyes = std::array::from_fn(|i| {
            let view = &input.eyes[i.min(eye_count - 1)];
            let current = view.projection * view.world_to_camera;
            EyeMatrices::new(view, previous.map_or(current, |p| p[i]))
        });
        Self {
            eyes,
            eye_count,
            position: input.position,
            near: input.near,
            far: input.far,
        }
    }

    /// Eyes in use this frame.
    pub fn active_eyes(&self) -> &[EyeMatrices] {
        &self.eyes[..self.eye_count]
    }

    /// This frame's view-projections, stored as next frame's previous.
    pub fn view_projections(&self) -> [Mat4; MAX_EYES] {
        [self.eyes[0].view_projection, self.eyes[1].view_projection]
    }

    /// Depth linearization constants for a standard (not reversed) depth buffer.
    ///
    /// `x = 1 - far/near`, `y = far/near`, `z = x/far`, `w = y/far`. Linear eye
    /// depth is `1 / (z * d + w)`; linear 0..1 depth is `1 / (x * d + y)`.
    pub fn zbuffer_params(&self) -> Vec4 {
        let x = 1.0 - self.far / self.near;
        let y = self.far / self.near;
        Vec4::new(x, y, x / self.far, y / self.far)
    }

    /// `(1, near, far, 1/far)`.
    pub fn projection_params(&self) -> Vec4 {
        Vec4::new(1.0, self.near, self.far, 1.0 / self.far)
    }
}

/// Linear eye depth of a device depth value.
pub fn linear_eye_depth(depth: f32, zbuffer_params: Vec4) -> f32 {
    1.0 / (zbuffer_params.z * depth + zbuffer_params.w)
}

/// Linear depth in [near/far, 1] of a device depth value.
pub fn linear01_depth(depth: f32, zbuffer_params: Vec4) -> f32 {
    1.0 / (zbuffer_params.x * depth + zbuffer_params.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4Swizzles;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn test_camera() -> CameraInput {
        CameraInput::look_at(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(1.0, 2.0, -10.0),
            Vec3::Y,
            1.0,
            1.5,
            0.1,
            100.0,
        )
    }

    #[test]
    fn test_first_frame_uses_current_as_previous() {
        let frame = CameraFrame::new(&test_camera(), None);
        assert_eq!(frame.eye_count, 1);
        let eye = frame.eyes[0];
        assert_eq!(eye.previous_view_projection, eye.view_projection);
        // Mono duplicates the eye into the unused slot.
        assert_eq!(frame.eyes[1], frame.eyes[0]);
    }

    #[test]
    fn test_previous_is_carried() {
        let previous = [Mat4::from_scale(Vec3::splat(2.0)); MAX_EYES];
        let frame = CameraFrame::new(&test_camera(), Some(&previous));
        assert_eq!(frame.eyes[0].previous_view_projection, previous[0]);
    }

    #[test]
    fn test_camera_to_world_is_z_flipped() {
        let frame = CameraFrame::new(&test_camera(), None);
        let forward = frame.eyes[0].camera_to_world * Vec4::new(0.0, 0.0, 1.0, 0.0);
        // The camera looks down world -Z.
        assert!(approx(forward.z, -1.0));
        let origin = frame.eyes[0].camera_to_world * Vec4::W;
        assert!(approx(origin.x, 1.0) && approx(origin.y, 2.0) && approx(origin.z, 3.0));
    }

    #[test]
    fn test_zbuffer_params_linearize_projection() {
        let camera = test_camera();
        let frame = CameraFrame::new(&camera, None);
        let zb = frame.zbuffer_params();
        for distance in [0.1_f32, 0.5, 4.0, 37.0, 100.0] {
            let view = Vec4::new(0.0, 0.0, -distance, 1.0);
            let clip = frame.eyes[0].projection * view;
            let depth = clip.z / clip.w;
            assert!(
                (linear_eye_depth(depth, zb) - distance).abs() < distance * 1e-3,
                "distance {distance}"
            );
            assert!((linear01_depth(depth, zb) - distance / camera.far).abs() < 1e-3);
        }
        assert_eq!(frame.projection_params(), Vec4::new(1.0, 0.1, 100.0, 0.01));
    }

    #[test]
    fn test_inverse_view_projection_round_trips_world_point() {
        let frame = CameraFrame::new(&test_camera(), None);
        let eye = frame.eyes[0];
        let world = Vec4::new(0.5, 1.5, -4.0, 1.0);
        let clip = eye.view_projection * world;
        let back = eye.inverse_view_projection * clip;
        let back = back.xyz() / back.w;
        assert!((back - world.xyz()).length() < 1e-3);
    }

    #[test]
    fn test_stereo_keeps_both_eyes() {
        let base = test_camera();
        let right = EyeView {
            world_to_camera: Mat4::from_translation(Vec3::X) * base.eyes[0].world_to_camera,
            projection: base.eyes[0].projection,
        };
        let input = CameraInput::stereo(base.position, base.eyes[0], right, 0.1, 100.0);
        let frame = CameraFrame::new(&input, None);
        assert_eq!(frame.active_eyes().len(), 2);
        assert_ne!(frame.eyes[0].view_projection, frame.eyes[1].view_projection);
    }
}
