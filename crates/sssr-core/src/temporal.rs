//! Temporal reprojection and accumulation of the resolved reflections.

use glam::{Vec2, Vec4, Vec4Swizzles};

use crate::commands::{
    Bindings, Command, HostTexture, Kernel, PersistentTexture, Slot, TexelFormat, TextureDesc,
    TextureRef,
};
use crate::extent::{Extent, FrameExtents};
use crate::reference::math::{join_eye, project, split_eye, unproject};
use crate::reference::Image;
use crate::scope::ResourceScope;
use crate::uniforms::FrameUniforms;

/// Screen-space speed, in pixels per frame, at which the response reaches its minimum.
pub const VELOCITY_SCALE: f32 = 8.0;

/// Records the accumulation into a transient. With `persist` the result is
/// also copied into the history buffer.
pub(crate) fn record(
    frame: &mut ResourceScope<'_>,
    extents: &FrameExtents,
    resolve: TextureRef,
    hits: TextureRef,
    persist: bool,
) -> TextureRef {
    let history = TextureRef::Persistent(PersistentTexture::History);
    let reflection = frame.acquire(TextureDesc::new(
        "SSR Temporal",
        extents.resolve,
        TexelFormat::Rgba16Float,
    ));
    let mut stage = frame.stage("Temporal");
    stage.record(Command::Dispatch {
        kernel: Kernel::Temporal,
        bindings: Bindings::new()
            .with(Slot::Source, resolve)
            .with(Slot::History, history)
            .with(Slot::Hits, hits)
            .with(Slot::Motion, TextureRef::Host(HostTexture::MotionVectors))
            .with(Slot::Result, reflection),
        groups: extents.resolve.dispatch_groups(Kernel::Temporal.group_size()),
    });
    if persist {
        stage.record(Command::Copy {
            source: reflection,
            destination: history,
        });
    }
    reflection
}

/// Blend factor toward history for a screen-space velocity in pixels.
///
/// Always inside `[min, max]`; a non-finite velocity counts as fast.
pub fn response_factor(velocity_px: f32, min: f32, max: f32) -> f32 {
    let speed = if velocity_px.is_finite() {
        (velocity_px / VELOCITY_SCALE).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let factor = max + (min - max) * speed;
    factor.clamp(min.min(max), max.max(min))
}

pub struct TemporalInputs<'a> {
    pub current: &'a Image,
    pub history: &'a Image,
    pub hits: &'a Image,
    pub motion: &'a Image,
}

/// Screen-UV velocity of a resolve texel.
pub fn velocity(inputs: &TemporalInputs<'_>, u: &FrameUniforms, uv: Vec2) -> Vec2 {
    let hit = inputs.hits.sample_point(0, uv);
    if hit.w < 0.5 {
        return inputs.motion.sample_point(0, uv).xy();
    }
    let eye_count = u.eye_count();
    let (eye, hit_eye_uv) = split_eye(hit.xy(), eye_count);
    let matrices = u.eye(eye);
    let world = unproject(hit_eye_uv, hit.z, &matrices.inverse_view_projection);
    let (previous_eye_uv, _) = project(world, &matrices.previous_view_projection);
    hit.xy() - join_eye(eye, previous_eye_uv, eye_count)
}

pub fn temporal_texel(inputs: &TemporalInputs<'_>, u: &FrameUniforms, extent: Extent, x: u32, y: u32) -> Vec4 {
    let current = inputs.current.get(x, y);
    let uv = (Vec2::new(x as f32, y as f32) + 0.5) / extent.as_vec2();

    let v = velocity(inputs, u, uv);
    let previous_uv = uv - v;
    let on_screen = previous_uv.x >= 0.0
        && previous_uv.x <= 1.0
        && previous_uv.y >= 0.0
        && previous_uv.y <= 1.0;

    let history = if u.history_valid() && on_screen && previous_uv.is_finite() {
        let sample = inputs.history.sample_bilinear(0, previous_uv);
        if sample.is_finite() {
            let (mut lo, mut hi) = (Vec4::splat(f32::INFINITY), Vec4::splat(f32::NEG_INFINITY));
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let n = inputs.current.load(0, x as i32 + dx, y as i32 + dy);
                    lo = lo.min(n);
                    hi = hi.max(n);
                }
            }
            sample.clamp(lo, hi)
        } else {
            current
        }
    } else {
        current
    };

    let screen = Vec2::new(u.screen_size[0], u.screen_size[1]);
    let (min, max) = u.temporal_response();
    let factor = response_factor((v * screen).length(), min, max);
    current.lerp(history, factor)
}

pub fn temporal(inputs: &TemporalInputs<'_>, u: &FrameUniforms, extent: Extent) -> Image {
    Image::from_fn(extent, |x, y| temporal_texel(inputs, u, extent, x, y))
}
