use post_fx_pipeline::renderer::{
    BufferPool, CameraParams, FrameInputs, FrameRenderer, GBuffer, ImageBuffer, PassExecutor,
    PixelFormat,
    effects::{
        ApertureShape, BloomBlend, BloomConfig, DepthOfFieldConfig, DofMode, EffectConfig,
        LensDistortConfig, SsrConfig, VignetteConfig,
    },
    mip_chain::build_blur_pyramid,
    ray_march::{GBufferView, RayState, TraceSettings, trace},
};
use proptest::prelude::*;

/// Mirror floor at `y = -1` in front of a rough wall at `z = -wall`.
fn floor_and_wall(size: [u32; 2], wall: f32) -> (GBuffer, CameraParams) {
    let cam = CameraParams::perspective(60.0, size[0] as f32 / size[1] as f32, 0.1, 100.0);
    let mut depth = ImageBuffer::new(size, PixelFormat::Rgba32Float);
    let mut normals = ImageBuffer::new(size, PixelFormat::Rgba32Float);
    let [w, h] = size;
    for y in 0..h {
        for x in 0..w {
            let uv = [(x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32];
            let dir = cam.view_position(uv, 1.0);
            let floor_t = if dir[1] < 0.0 {
                -1.0 / dir[1]
            } else {
                f32::INFINITY
            };
            if floor_t < wall {
                depth.set(x, y, [floor_t, 0.0, 0.0, 1.0]);
                normals.set(x, y, [0.5, 1.0, 0.5, 0.9]);
            } else {
                depth.set(x, y, [wall, 0.0, 0.0, 1.0]);
                normals.set(x, y, [0.5, 0.5, 1.0, 0.3]);
            }
        }
    }
    (GBuffer { depth, normals }, cam)
}

fn noise_image(size: [u32; 2], seed: u32) -> ImageBuffer {
    let mut img = ImageBuffer::new(size, PixelFormat::Rgba16Float);
    img.fill_with(|x, y| {
        let h = (x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663) ^ seed) % 1000;
        let v = h as f32 / 250.0;
        [v, v * 0.5, 1.0 - v * 0.25, 1.0]
    });
    img
}

fn effect_strategy() -> impl Strategy<Value = EffectConfig> {
    prop_oneof![
        (0.0f32..2.0, 0.0f32..2.0, any::<bool>(), any::<bool>()).prop_map(
            |(threshold, intensity, hq, screen)| EffectConfig::Bloom(
                BloomConfig {
                    threshold,
                    intensity,
                    high_quality: hq,
                    blend: if screen {
                        BloomBlend::Screen
                    } else {
                        BloomBlend::Add
                    },
                    ..BloomConfig::default()
                }
                .clamped()
            )
        ),
        (0.0f32..15.0, 0u8..3, any::<bool>()).prop_map(|(radius, shape, advanced)| {
            EffectConfig::DepthOfField(
                DepthOfFieldConfig {
                    near_radius: radius,
                    far_radius: radius,
                    near_boost: 1.0,
                    mode: if advanced {
                        DofMode::Advanced
                    } else {
                        DofMode::Basic
                    },
                    shape: match shape {
                        0 => ApertureShape::Hexagon,
                        1 => ApertureShape::Octagon,
                        _ => ApertureShape::Circle,
                    },
                    ..DepthOfFieldConfig::default()
                }
                .clamped(),
            )
        }),
        (0.0f32..1.0, 0.0f32..1.0).prop_map(|(darken, blur)| EffectConfig::Vignette(
            VignetteConfig {
                darken,
                blur,
                ..VignetteConfig::default()
            }
        )),
        (0.0f32..60.0, 0.0f32..1.0).prop_map(|(amount, ca)| EffectConfig::LensDistort(
            LensDistortConfig {
                amount,
                chromatic_aberration: ca,
                ..LensDistortConfig::default()
            }
        )),
        (0u32..64, any::<bool>(), any::<bool>()).prop_map(|(steps, half, full)| {
            let mut cfg = SsrConfig {
                half_resolution: half,
                full_res_resolve: full,
                ..SsrConfig::default()
            };
            cfg.trace.max_steps = steps;
            EffectConfig::ScreenSpaceReflection(cfg)
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn pipeline_never_leaks_buffers(
        w in 2u32..24,
        h in 2u32..24,
        seed in any::<u32>(),
        effects in prop::collection::vec(effect_strategy(), 0..4),
    ) {
        let (gbuffer, camera) = floor_and_wall([w, h], 6.0);
        let renderer = FrameRenderer::new();
        let inputs = FrameInputs::new(noise_image([w, h], seed))
            .with_camera(camera)
            .with_gbuffer(gbuffer);
        let out = renderer.render_frame(&inputs, &effects);
        prop_assert_eq!(out.size(), [w, h]);
        prop_assert_eq!(out.format, PixelFormat::Rgba16Float);
        prop_assert_eq!(renderer.pool().outstanding(), 0);
    }

    #[test]
    fn budget_failures_still_write_output(
        budget in 0usize..20_000,
        effects in prop::collection::vec(effect_strategy(), 1..3),
    ) {
        let (gbuffer, camera) = floor_and_wall([16, 16], 6.0);
        let renderer = FrameRenderer::with_pool(BufferPool::with_budget(budget));
        let inputs = FrameInputs::new(noise_image([16, 16], 7))
            .with_camera(camera)
            .with_gbuffer(gbuffer);
        let out = renderer.render_frame(&inputs, &effects);
        prop_assert_eq!(out.size(), [16, 16]);
        prop_assert_eq!(renderer.pool().outstanding(), 0);
    }

    #[test]
    fn mip_levels_halve_with_floor_at_one(w in 1u32..300, h in 1u32..300, radius in 0u32..4) {
        let pool = BufferPool::new();
        let ex = PassExecutor::with_builtin_kernels();
        let src = ImageBuffer::new([w, h], PixelFormat::Rgba16Float);
        let chain = build_blur_pyramid(&pool, &ex, &src, 5, radius).unwrap();
        prop_assert_eq!(chain.len(), 5);
        for i in 0..chain.len() {
            let level = chain.level(i).unwrap();
            prop_assert_eq!(level.size(), [(w >> i).max(1), (h >> i).max(1)]);
        }
        drop(chain);
        prop_assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn ray_hits_stay_on_screen_within_budget(
        w in 8u32..48,
        h in 8u32..48,
        max_steps in 0u32..200,
        ray_pixels_step in 0u32..5,
        reduce_banding in any::<bool>(),
        wall in 3.0f32..12.0,
    ) {
        let (gbuffer, camera) = floor_and_wall([w, h], wall);
        let settings = TraceSettings {
            max_steps,
            ray_pixels_step,
            reduce_banding,
            wall_thickness: 1.0,
            ..TraceSettings::default()
        };
        let hits = trace(gbuffer.view(), &camera, &settings, [w, h]);
        for hit in hits.hits().iter().filter(|h| h.valid()) {
            prop_assert!(hit.steps <= max_steps);
            prop_assert!(hit.position[0] >= 0.0 && hit.position[0] < w as f32);
            prop_assert!(hit.position[1] >= 0.0 && hit.position[1] < h as f32);
        }
    }
}

#[test]
fn radius_zero_pyramid_is_a_pure_box_chain() {
    let pool = BufferPool::new();
    let ex = PassExecutor::with_builtin_kernels();
    let mut src = ImageBuffer::new([37, 22], PixelFormat::Rgba32Float);
    src.fill_with(|x, y| [x as f32, y as f32, (x * y) as f32 * 0.01, 1.0]);
    let chain = build_blur_pyramid(&pool, &ex, &src, 5, 0).unwrap();
    assert_eq!(chain.level(0).unwrap().pixels(), src.pixels());

    for i in 1..chain.len() {
        let prev = chain.level(i - 1).unwrap();
        let level = chain.level(i).unwrap();
        let [pw, ph] = prev.size();
        let [w, h] = level.size();
        for y in 0..h {
            for x in 0..w {
                let mut expected = [0.0f32; 4];
                for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    let sx = (2 * x + dx).min(pw - 1);
                    let sy = (2 * y + dy).min(ph - 1);
                    let px = prev.pixels()[(sy * pw + sx) as usize];
                    for c in 0..4 {
                        expected[c] += px[c] / 4.0;
                    }
                }
                let got = level.get(x, y);
                for c in 0..4 {
                    assert!(
                        (got[c] - expected[c]).abs() <= 1e-4 * expected[c].abs().max(1.0),
                        "level {i} texel ({x},{y}) channel {c}: {} vs {}",
                        got[c],
                        expected[c]
                    );
                }
            }
        }
    }
}

#[test]
fn zero_steps_classifies_every_pixel_as_miss() {
    let (gbuffer, camera) = floor_and_wall([32, 24], 6.0);
    let settings = TraceSettings {
        max_steps: 0,
        trace_everywhere: true,
        ..TraceSettings::default()
    };
    let hits = trace(
        GBufferView {
            depth: &gbuffer.depth,
            normals: &gbuffer.normals,
        },
        &camera,
        &settings,
        [32, 24],
    );
    assert!(hits.hits().iter().all(|h| h.state == RayState::Miss));
}
