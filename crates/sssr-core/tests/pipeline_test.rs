//! End-to-end tests of the frame recorder on the CPU reference executor.
//!
//! The scene is a mirror floor at y = -1 facing a uniformly colored wall at
//! z = -5, seen from a camera near the origin looking down -Z.

use glam::{Mat4, Vec2, Vec3, Vec4};
use sssr_core::raycast::texel_edge_fade;
use sssr_core::reference::math::{project, unproject};
use sssr_core::reference::{HostImages, Image, ReferenceExecutor};
use sssr_core::{
    CameraInput, CommandList, DebugPass, Extent, HostFrame, PersistentTexture, SsrConfig,
    StochasticReflections, TextureRef,
};

const FLOOR_COLOR: Vec3 = Vec3::new(0.05, 0.05, 0.05);
const WALL_COLOR: Vec3 = Vec3::new(0.2, 0.6, 0.9);

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn camera_at(position: Vec3) -> CameraInput {
    CameraInput::look_at(
        position,
        position - Vec3::Z,
        Vec3::Y,
        std::f32::consts::FRAC_PI_2,
        1.0,
        0.1,
        100.0,
    )
}

/// Rasterizes the floor and wall analytically into host G-buffers.
fn render_scene(camera: &CameraInput, previous: Option<Mat4>, extent: Extent) -> HostImages {
    let eye = camera.eyes[0];
    let view_projection = eye.projection * eye.world_to_camera;
    let inverse = view_projection.inverse();

    let mut scene = Image::new(extent, 1);
    let mut depth = Image::new(extent, 1);
    let mut normal = Image::new(extent, 1);
    let mut specular = Image::new(extent, 1);
    let mut motion = Image::new(extent, 1);

    for y in 0..extent.height {
        for x in 0..extent.width {
            let uv = (Vec2::new(x as f32, y as f32) + 0.5) / extent.as_vec2();
            let dir = (unproject(uv, 0.5, &inverse) - camera.position).normalize();
            let floor_t = if dir.y < 0.0 {
                (-1.0 - camera.position.y) / dir.y
            } else {
                f32::INFINITY
            };
            let wall_t = if dir.z < 0.0 {
                (-5.0 - camera.position.z) / dir.z
            } else {
                f32::INFINITY
            };
            let t = floor_t.min(wall_t);
            if !t.is_finite() {
                depth.store(0, x, y, Vec4::new(1.0, 0.0, 0.0, 0.0));
                normal.store(0, x, y, Vec4::new(0.5, 0.5, 0.5, 1.0));
                continue;
            }
            let point = camera.position + dir * t;
            let on_floor = floor_t < wall_t;
            let (n, color, roughness, f0) = if on_floor {
                (Vec3::Y, FLOOR_COLOR, 0.0, Vec3::ONE)
            } else {
                (Vec3::Z, WALL_COLOR, 0.9, Vec3::splat(0.04))
            };
            let (_, d) = project(point, &view_projection);
            scene.store(0, x, y, color.extend(1.0));
            depth.store(0, x, y, Vec4::new(d, 0.0, 0.0, 0.0));
            normal.store(0, x, y, (n * 0.5 + Vec3::splat(0.5)).extend(roughness));
            specular.store(0, x, y, f0.extend(0.0));
            if let Some(previous) = previous {
                let (previous_uv, _) = project(point, &previous);
                let m = uv - previous_uv;
                motion.store(0, x, y, Vec4::new(m.x, m.y, 0.0, 0.0));
            }
        }
    }

    HostImages {
        scene_color: scene,
        depth,
        gbuffer_normal_roughness: normal,
        gbuffer_specular: specular,
        motion_vectors: motion,
        probe_reflections: None,
        destination: Image::new(extent, 1),
    }
}

/// Places two eye renders next to each other.
fn side_by_side(left: &HostImages, right: &HostImages) -> HostImages {
    let join = |l: &Image, r: &Image| {
        let eye = l.extent();
        Image::from_fn(Extent::new(eye.width * 2, eye.height), |x, y| {
            if x < eye.width {
                l.get(x, y)
            } else {
                r.get(x - eye.width, y)
            }
        })
    };
    let eye = left.destination.extent();
    HostImages {
        scene_color: join(&left.scene_color, &right.scene_color),
        depth: join(&left.depth, &right.depth),
        gbuffer_normal_roughness: join(&left.gbuffer_normal_roughness, &right.gbuffer_normal_roughness),
        gbuffer_specular: join(&left.gbuffer_specular, &right.gbuffer_specular),
        motion_vectors: join(&left.motion_vectors, &right.motion_vectors),
        probe_reflections: None,
        destination: Image::new(Extent::new(eye.width * 2, eye.height), 1),
    }
}

fn mirror_config() -> SsrConfig {
    SsrConfig::new()
        .with_intensity(1.0)
        .with_ray_distance(70)
        .with_thickness(0.2)
        .with_smoothness_range(0.5)
}

fn run(
    effect: &mut StochasticReflections,
    executor: &mut ReferenceExecutor,
    frame: &HostFrame,
    host: &mut HostImages,
) -> CommandList {
    let list = effect.record_frame(frame).expect("frame should not be gated");
    list.validate().unwrap();
    executor.execute(&list, host).unwrap();
    assert_eq!(executor.live_transients(), 0);
    list
}

/// Floor pixels well inside the screen and away from the floor/wall seam.
fn interior_floor(extent: Extent) -> Vec<(u32, u32)> {
    let mut texels = Vec::new();
    for y in (extent.height * 13 / 20)..(extent.height * 17 / 20) {
        for x in (extent.width * 3 / 10)..(extent.width * 7 / 10) {
            texels.push((x, y));
        }
    }
    texels
}

#[test]
fn test_every_selector_and_flag_combination_balances_resources() {
    init_logger();
    let frame = HostFrame::new(Extent::new(40, 24), camera_at(Vec3::ZERO));
    for pass in DebugPass::ALL {
        for bits in 0..128_u32 {
            let bit = |i: u32| bits & (1 << i) != 0;
            let config = SsrConfig::new()
                .with_intensity(1.0)
                .with_debug_pass(pass)
                .with_temporal(bit(0))
                .with_blur(bit(1), bit(2))
                .with_mip_map(bit(3))
                .with_multiple_bounces(bit(4))
                .with_downsample(bit(5), bit(6));
            let mut effect = StochasticReflections::new(config);
            for frame in [frame, frame, frame.with_preview_camera(true), frame.with_playing(false)] {
                let list = effect.record_frame(&frame).unwrap();
                if let Err(e) = list.validate() {
                    panic!("{pass:?} flags {bits:#09b}: {e}");
                }
            }
        }
    }
}

#[test]
fn test_reference_executor_runs_every_selector() {
    init_logger();
    let extent = Extent::new(32, 32);
    let camera = camera_at(Vec3::ZERO);
    let frame = HostFrame::new(extent, camera);
    for pass in DebugPass::ALL {
        for (temporal, blur, high_quality) in [(true, true, true), (false, true, false), (true, false, false)] {
            let config = mirror_config()
                .with_debug_pass(pass)
                .with_temporal(temporal)
                .with_blur(blur, high_quality)
                .with_downsample(temporal, false);
            let mut effect = StochasticReflections::new(config);
            let mut executor = ReferenceExecutor::new();
            let mut host = render_scene(&camera, None, extent);
            run(&mut effect, &mut executor, &frame, &mut host);
            run(&mut effect, &mut executor, &frame, &mut host);
            assert!(host.destination.level(0).iter().all(|t| t.is_finite()));
        }
    }
}

#[test]
fn test_mirror_floor_reflects_wall() {
    init_logger();
    let extent = Extent::new(64, 64);
    let camera = camera_at(Vec3::ZERO);
    let frame = HostFrame::new(extent, camera);
    let config = mirror_config()
        .with_temporal(false)
        .with_blur(false, false)
        .with_multiple_bounces(false);

    // Every interior floor pixel hits the wall.
    let mut effect = StochasticReflections::new(config.clone().with_debug_pass(DebugPass::SsrMask));
    let mut executor = ReferenceExecutor::new();
    let mut host = render_scene(&camera, None, extent);
    run(&mut effect, &mut executor, &frame, &mut host);
    for (x, y) in interior_floor(extent) {
        let mask = host.destination.get(x, y).x;
        assert!(mask > 0.9, "mask {mask} at ({x}, {y})");
    }

    // The resolved reflection is the wall color.
    effect.set_config(config.clone().with_debug_pass(DebugPass::Resolve));
    run(&mut effect, &mut executor, &frame, &mut host);
    for (x, y) in interior_floor(extent) {
        let resolved = host.destination.get(x, y).truncate();
        assert!(
            (resolved - WALL_COLOR).abs().max_element() < 0.05,
            "resolved {resolved} at ({x}, {y})"
        );
    }

    // A mirror with F0 = 1 adds the wall on top of the floor.
    effect.set_config(config);
    run(&mut effect, &mut executor, &frame, &mut host);
    for (x, y) in interior_floor(extent) {
        let combined = host.destination.get(x, y).truncate();
        assert!((combined - (FLOOR_COLOR + WALL_COLOR)).abs().max_element() < 0.05);
    }

    // The wall is too rough to trace and keeps its color.
    let wall = host.destination.get(32, 16).truncate();
    assert!((wall - WALL_COLOR).abs().max_element() < 1e-3);
}

#[test]
fn test_identical_frames_are_bit_identical() {
    init_logger();
    let extent = Extent::new(48, 32);
    let camera = camera_at(Vec3::ZERO);
    let frame = HostFrame::new(extent, camera);
    let config = mirror_config()
        .with_temporal(false)
        .with_multiple_bounces(false);
    let mut effect = StochasticReflections::new(config);
    let mut executor = ReferenceExecutor::new();

    let mut host = render_scene(&camera, None, extent);
    run(&mut effect, &mut executor, &frame, &mut host);
    let first = host.destination.clone();

    effect.reset_history();
    let mut host = render_scene(&camera, None, extent);
    run(&mut effect, &mut executor, &frame, &mut host);
    assert_eq!(host.destination, first);
}

#[test]
fn test_temporal_change_is_non_increasing_for_moving_camera() {
    init_logger();
    let extent = Extent::new(48, 48);
    let config = mirror_config()
        .with_temporal(true)
        .with_temporal_response(0.85, 1.0)
        .with_multiple_bounces(false);
    let mut effect = StochasticReflections::new(config);
    let mut executor = ReferenceExecutor::new();

    let mut previous_vp = None;
    let mut previous_output: Option<Image> = None;
    let mut changes = Vec::new();
    for i in 0..7 {
        let camera = camera_at(Vec3::new(0.02 * i as f32, 0.0, 0.0));
        let frame = HostFrame::new(extent, camera);
        let mut host = render_scene(&camera, previous_vp, extent);
        run(&mut effect, &mut executor, &frame, &mut host);

        let output = host.destination.clone();
        if let Some(previous) = &previous_output {
            let region = interior_floor(extent);
            let change: f32 = region
                .iter()
                .map(|(x, y)| (output.get(*x, *y) - previous.get(*x, *y)).abs().max_element())
                .sum::<f32>()
                / region.len() as f32;
            changes.push(change);
        }
        previous_output = Some(output);
        previous_vp = Some(camera.eyes[0].projection * camera.eyes[0].world_to_camera);
    }

    assert!(changes.len() >= 5);
    for pair in changes.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-3, "changes {changes:?}");
    }
}

#[test]
fn test_debug_selectors_never_touch_history() {
    init_logger();
    let extent = Extent::new(32, 32);
    let camera = camera_at(Vec3::ZERO);
    let frame = HostFrame::new(extent, camera);

    for pass in DebugPass::ALL.into_iter().filter(|p| *p != DebugPass::Combine) {
        let mut effect = StochasticReflections::new(mirror_config());
        let mut executor = ReferenceExecutor::new();
        let mut host = render_scene(&camera, None, extent);
        run(&mut effect, &mut executor, &frame, &mut host);

        let history = executor
            .persistent(PersistentTexture::History)
            .cloned()
            .unwrap();
        let previous_vp = *effect.state().previous_view_projection().unwrap();

        effect.set_config(mirror_config().with_debug_pass(pass));
        let moved = HostFrame::new(extent, camera_at(Vec3::new(0.3, 0.1, 0.0)));
        let mut host = render_scene(&moved.camera, Some(previous_vp[0]), extent);
        let list = run(&mut effect, &mut executor, &moved, &mut host);

        assert!(!list.writes(TextureRef::Persistent(PersistentTexture::History)));
        assert_eq!(executor.persistent(PersistentTexture::History), Some(&history));
        assert_eq!(effect.state().previous_view_projection(), Some(&previous_vp));
    }
}

#[test]
fn test_gated_frame_records_nothing() {
    init_logger();
    let frame = HostFrame::new(Extent::new(16, 16), camera_at(Vec3::ZERO));
    let mut effect = StochasticReflections::new(SsrConfig::new().with_intensity(1.0).with_enabled(false));
    assert!(effect.record_frame(&frame).is_none());
    assert_eq!(effect.state().frame_index(), 0);
    assert!(effect.state().previous_view_projection().is_none());
}

#[test]
fn test_mask_is_zero_on_screen_border() {
    init_logger();
    let extent = Extent::new(64, 64);
    let camera = camera_at(Vec3::ZERO);
    let frame = HostFrame::new(extent, camera);
    let config = mirror_config()
        .with_temporal(false)
        .with_blur(false, false)
        .with_multiple_bounces(false)
        .with_debug_pass(DebugPass::SsrMask);
    let fade = config.screen_fade_size;
    let mut effect = StochasticReflections::new(config);
    let mut executor = ReferenceExecutor::new();
    let mut host = render_scene(&camera, None, extent);
    run(&mut effect, &mut executor, &frame, &mut host);
    let mask = |x: u32, y: u32| host.destination.get(x, y).x;

    let (last_x, last_y) = (extent.width - 1, extent.height - 1);
    for y in 0..extent.height {
        assert_eq!(mask(0, y), 0.0, "left column at row {y}");
        assert_eq!(mask(last_x, y), 0.0, "right column at row {y}");
    }
    for x in 0..extent.width {
        assert_eq!(mask(x, last_y), 0.0, "bottom row at column {x}");
    }

    let size = extent.as_vec2();
    let envelope = |x: u32, y: u32| texel_edge_fade(Vec2::new(x as f32, y as f32), size, fade);
    for y in 0..extent.height {
        for x in 0..extent.width {
            assert!(mask(x, y) <= envelope(x, y) + 1e-6, "mask {} at ({x}, {y})", mask(x, y));
        }
    }

    // Toward the bottom edge the floor fades out row by row.
    let band_start = extent.height - (fade * 0.5 * (extent.height - 1) as f32) as u32;
    for x in (extent.width * 7 / 16)..(extent.width * 9 / 16) {
        for y in band_start..last_y {
            assert!(envelope(x, y + 1) < envelope(x, y));
            assert!(mask(x, y) >= 0.8 * envelope(x, y), "mask {} at ({x}, {y})", mask(x, y));
        }
    }
}

#[test]
fn test_stereo_halves_match_mono_frame() {
    init_logger();
    let eye_extent = Extent::new(64, 64);
    let mono = camera_at(Vec3::ZERO);
    let stereo = CameraInput::stereo(mono.position, mono.eyes[0], mono.eyes[0], mono.near, mono.far);
    let stereo_extent = Extent::new(eye_extent.width * 2, eye_extent.height);
    let config = mirror_config()
        .with_temporal(false)
        .with_blur(false, false)
        .with_multiple_bounces(false);

    for pass in [DebugPass::Resolve, DebugPass::Combine] {
        let mut effect = StochasticReflections::new(config.clone().with_debug_pass(pass));
        let mut executor = ReferenceExecutor::new();
        let mut mono_host = render_scene(&mono, None, eye_extent);
        run(&mut effect, &mut executor, &HostFrame::new(eye_extent, mono), &mut mono_host);

        let mut effect = StochasticReflections::new(config.clone().with_debug_pass(pass));
        let mut executor = ReferenceExecutor::new();
        let eye = render_scene(&mono, None, eye_extent);
        let mut stereo_host = side_by_side(&eye, &eye);
        let list = run(
            &mut effect,
            &mut executor,
            &HostFrame::new(stereo_extent, stereo),
            &mut stereo_host,
        );
        assert_eq!(list.uniforms.eye_count(), 2);

        for offset in [0, eye_extent.width] {
            for (x, y) in interior_floor(eye_extent) {
                let expected = mono_host.destination.get(x, y).truncate();
                let actual = stereo_host.destination.get(x + offset, y).truncate();
                assert!(
                    (actual - expected).abs().max_element() < 0.05,
                    "{pass:?}: stereo {actual} mono {expected} at ({}, {y})",
                    x + offset
                );
            }
        }
    }
}

#[test]
fn test_mirror_floor_reflects_wall_at_half_raycast_resolution() {
    init_logger();
    let extent = Extent::new(64, 64);
    let camera = camera_at(Vec3::ZERO);
    let frame = HostFrame::new(extent, camera);
    let config = mirror_config()
        .with_temporal(false)
        .with_blur(false, false)
        .with_multiple_bounces(false)
        .with_downsample(true, false)
        .with_debug_pass(DebugPass::Resolve);
    let mut effect = StochasticReflections::new(config);
    let mut executor = ReferenceExecutor::new();
    let mut host = render_scene(&camera, None, extent);
    run(&mut effect, &mut executor, &frame, &mut host);
    for (x, y) in interior_floor(extent) {
        let resolved = host.destination.get(x, y).truncate();
        assert!(
            (resolved - WALL_COLOR).abs().max_element() < 0.05,
            "resolved {resolved} at ({x}, {y})"
        );
    }
}
