//! Scratch-source selection, the bounce pass and the final composite.

use glam::{Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::camera::linear01_depth;
use crate::commands::{BlitPass, Bindings, Command, HostTexture, PersistentTexture, Slot, TextureRef};
use crate::debug_view::{DebugView, Intermediate};
use crate::extent::Extent;
use crate::reference::math::{decode_normal, split_eye, to_view_normal, unproject};
use crate::reference::Image;
use crate::scope::ResourceScope;
use crate::uniforms::FrameUniforms;

const SCENE: TextureRef = TextureRef::Host(HostTexture::SceneColor);
const SCRATCH: TextureRef = TextureRef::Persistent(PersistentTexture::Scratch);
const RECURSIVE: TextureRef = TextureRef::Persistent(PersistentTexture::Recursive);
const DESTINATION: TextureRef = TextureRef::Host(HostTexture::Destination);

/// Fills mip 0 of the scratch buffer with the color rays will reflect.
pub(crate) fn record_scratch_source(frame: &mut ResourceScope<'_>, view: DebugView, reuse_composite: bool) {
    let mut stage = frame.stage("Scratch Source");
    if view.strips_cubemap {
        stage.record(Command::Blit {
            pass: BlitPass::RemoveCubemap,
            bindings: Bindings::new()
                .with(Slot::Source, SCENE)
                .with(Slot::Probe, TextureRef::Host(HostTexture::ProbeReflections)),
            destination: SCRATCH,
        });
    } else if reuse_composite {
        stage.record(Command::Blit {
            pass: BlitPass::Recursive,
            bindings: Bindings::new()
                .with(Slot::Source, SCRATCH)
                .with(Slot::Scene, SCENE)
                .with(Slot::Motion, TextureRef::Host(HostTexture::MotionVectors)),
            destination: RECURSIVE,
        });
        stage.record(Command::Blit {
            pass: BlitPass::Blit,
            bindings: Bindings::new().with(Slot::Source, RECURSIVE),
            destination: SCRATCH,
        });
    } else {
        stage.record(Command::Blit {
            pass: BlitPass::Blit,
            bindings: Bindings::new().with(Slot::Source, SCENE),
            destination: SCRATCH,
        });
    }
}

/// Intermediate buffers the composite can show.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CompositeSources {
    pub reflection: TextureRef,
    pub resolve: TextureRef,
    pub hits: TextureRef,
    pub mask: TextureRef,
    pub cost_map: TextureRef,
    pub min_depth: TextureRef,
}

pub(crate) fn record_composite(
    frame: &mut ResourceScope<'_>,
    sources: &CompositeSources,
    view: DebugView,
    bounce: bool,
) {
    let mut stage = frame.stage("Composite");
    let bindings = Bindings::new()
        .with(Slot::Source, SCENE)
        .with(Slot::Reflection, sources.reflection)
        .with(Slot::Mask, sources.mask)
        .with(Slot::Hits, sources.hits)
        .with(Slot::CostMap, sources.cost_map)
        .with(Slot::MinDepth, sources.min_depth)
        .with(Slot::Resolve, sources.resolve)
        .with(Slot::Normal, TextureRef::Host(HostTexture::GBufferNormalRoughness))
        .with(Slot::Specular, TextureRef::Host(HostTexture::GBufferSpecular))
        .with(Slot::Probe, TextureRef::Host(HostTexture::ProbeReflections));

    if bounce && !view.bypasses_composite {
        stage.record(Command::Blit {
            pass: BlitPass::Combine,
            bindings,
            destination: SCRATCH,
        });
        stage.record(Command::Blit {
            pass: BlitPass::Blit,
            bindings: Bindings::new().with(Slot::Source, SCRATCH),
            destination: DESTINATION,
        });
    } else {
        stage.record(Command::Blit {
            pass: BlitPass::Combine,
            bindings,
            destination: DESTINATION,
        });
    }
}

/// Scene color with the probe reflections taken out.
pub fn remove_cubemap(scene: &Image, probe: &Image, extent: Extent) -> Image {
    let size = extent.as_vec2();
    Image::from_fn(extent, |x, y| {
        let uv = (Vec2::new(x as f32, y as f32) + 0.5) / size;
        let s = scene.sample_bilinear(0, uv);
        let p = probe.sample_bilinear(0, uv);
        (s.xyz() - p.xyz()).max(Vec3::ZERO).extend(s.w)
    })
}

/// Previous composite reprojected by the motion vectors; scene color where it left the screen.
pub fn recursive(previous: &Image, scene: &Image, motion: &Image, extent: Extent) -> Image {
    let size = extent.as_vec2();
    Image::from_fn(extent, |x, y| {
        let uv = (Vec2::new(x as f32, y as f32) + 0.5) / size;
        let previous_uv = uv - motion.sample_point(0, uv).xy();
        let inside = previous_uv.cmpge(Vec2::ZERO).all() && previous_uv.cmple(Vec2::ONE).all();
        if inside {
            previous.sample_bilinear(0, previous_uv)
        } else {
            scene.sample_bilinear(0, uv)
        }
    })
}

pub fn blit(source: &Image, extent: Extent) -> Image {
    let size = extent.as_vec2();
    Image::from_fn(extent, |x, y| {
        source.sample_bilinear(0, (Vec2::new(x as f32, y as f32) + 0.5) / size)
    })
}

/// Schlick Fresnel, or F0 alone when disabled.
pub fn fresnel(f0: Vec3, n_dot_v: f32, enabled: bool) -> Vec3 {
    if !enabled {
        return f0;
    }
    f0 + (Vec3::ONE - f0) * (1.0 - n_dot_v.clamp(0.0, 1.0)).powi(5)
}

pub struct CombineInputs<'a> {
    pub scene: &'a Image,
    pub reflection: &'a Image,
    pub mask: &'a Image,
    pub hits: &'a Image,
    pub cost_map: &'a Image,
    pub min_depth: &'a Image,
    pub resolve: &'a Image,
    pub normal_roughness: &'a Image,
    pub specular: &'a Image,
    pub probe: &'a Image,
}

/// Reflection texel, with its alpha replaced by a 4-tap average when `mask_blur` is set.
fn reflection_at(reflection: &Image, uv: Vec2, mask_blur: bool) -> Vec4 {
    let r = reflection.sample_bilinear(0, uv);
    if !mask_blur {
        return r;
    }
    let texel = Vec2::ONE / reflection.extent().as_vec2();
    let alpha = [(-1.0, -1.0), (1.0, -1.0), (-1.0, 1.0), (1.0, 1.0)]
        .iter()
        .map(|(dx, dy)| reflection.sample_bilinear(0, uv + Vec2::new(*dx, *dy) * texel).w)
        .sum::<f32>()
        * 0.25;
    r.xyz().extend(alpha)
}

pub fn combine_texel(inputs: &CombineInputs<'_>, u: &FrameUniforms, uv: Vec2) -> Vec4 {
    let scene = inputs.scene.sample_bilinear(0, uv);
    let probe = inputs.probe.sample_bilinear(0, uv).xyz();
    let depth = inputs.min_depth.sample_point(0, uv).x;
    let refl = reflection_at(inputs.reflection, uv, u.mask_blur());

    let (eye, eye_uv) = split_eye(uv, u.eye_count());
    let matrices = u.eye(eye);
    let gbuffer = inputs.normal_roughness.sample_point(0, uv);
    let n = to_view_normal(decode_normal(gbuffer), &matrices.world_to_camera);
    let v = -unproject(eye_uv, depth, &matrices.inverse_projection).normalize_or_zero();
    let f0 = inputs.specular.sample_point(0, uv).xyz();
    let f = fresnel(f0, n.dot(v), u.use_fresnel());
    let sky = depth >= 1.0;
    let reflected = if sky {
        Vec3::ZERO
    } else {
        u.intensity() * f * refl.xyz()
    };

    let rgb = match u.shown_intermediate() {
        None => {
            if sky {
                scene.xyz()
            } else {
                scene.xyz() + u.intensity() * f * (refl.xyz() - probe * refl.w)
            }
        }
        Some(Intermediate::Reflection) => reflected,
        Some(Intermediate::Cubemap) => probe,
        Some(Intermediate::ReflectionAndCubemap) => probe.lerp(refl.xyz(), refl.w),
        Some(Intermediate::RaycastMask) => Vec3::splat(inputs.mask.sample_point(0, uv).x),
        Some(Intermediate::CombineNoCubemap) => scene.xyz() - probe + reflected,
        Some(Intermediate::RaycastHits) => {
            let hit = inputs.hits.sample_point(0, uv);
            return Vec4::new(hit.x, hit.y, 0.0, hit.w);
        }
        Some(Intermediate::CostMap) => {
            let cost = inputs.cost_map.sample_point(0, uv);
            Vec3::new(cost.x, cost.y, 0.0)
        }
        Some(Intermediate::Depth) => Vec3::splat(linear01_depth(depth, u.zbuffer())),
        Some(Intermediate::Resolve) => inputs.resolve.sample_bilinear(0, uv).xyz(),
    };
    rgb.extend(scene.w)
}

pub fn combine(inputs: &CombineInputs<'_>, u: &FrameUniforms, extent: Extent) -> Image {
    let size = extent.as_vec2();
    Image::from_fn(extent, |x, y| {
        combine_texel(inputs, u, (Vec2::new(x as f32, y as f32) + 0.5) / size)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresnel_limits() {
        let f0 = Vec3::splat(0.04);
        assert_eq!(fresnel(f0, 1.0, true), f0);
        assert!((fresnel(f0, 0.0, true) - Vec3::ONE).length() < 1e-6);
        assert_eq!(fresnel(f0, 0.0, false), f0);
    }

    #[test]
    fn test_remove_cubemap_subtracts_probe() {
        let extent = Extent::new(2, 2);
        let scene = Image::filled(extent, Vec4::new(0.6, 0.5, 0.4, 1.0));
        let probe = Image::filled(extent, Vec4::new(0.1, 0.6, 0.2, 0.0));
        let out = remove_cubemap(&scene, &probe, extent);
        let t = out.get(1, 1);
        assert!((t - Vec4::new(0.5, 0.0, 0.2, 1.0)).abs().max_element() < 1e-6);
    }

    #[test]
    fn test_recursive_falls_back_to_scene_off_screen() {
        let extent = Extent::new(4, 1);
        let previous = Image::filled(extent, Vec4::ONE);
        let scene = Image::filled(extent, Vec4::splat(0.5));
        let motion = Image::filled(extent, Vec4::new(0.3, 0.0, 0.0, 0.0));
        let out = recursive(&previous, &scene, &motion, extent);
        assert_eq!(out.get(0, 0), Vec4::splat(0.5));
        assert_eq!(out.get(3, 0), Vec4::ONE);
    }
}
