use post_fx_pipeline::{
    dsl,
    renderer::{
        CameraParams, FrameInputs, FrameRenderer, GBuffer, ImageBuffer, PixelFormat,
        effects::{
            BloomConfig, DepthOfFieldConfig, EffectConfig, LensDistortConfig, SsrConfig,
            VignetteConfig,
        },
        kernels::pass,
    },
};
use serde_json::json;

/// Flat wet floor seen from above at a slant: every pixel is smooth and
/// faces the camera enough to trace.
fn glossy_gbuffer(size: [u32; 2]) -> GBuffer {
    let mut depth = ImageBuffer::new(size, PixelFormat::Rgba32Float);
    depth.fill_with(|_, y| [4.0 + y as f32 * 0.1, 0.0, 0.0, 1.0]);
    let normals = ImageBuffer::filled(size, PixelFormat::Rgba32Float, [0.5, 0.9, 0.7, 1.0]);
    GBuffer { depth, normals }
}

fn checker(size: [u32; 2]) -> ImageBuffer {
    let mut img = ImageBuffer::new(size, PixelFormat::Rgba16Float);
    img.fill_with(|x, y| {
        if (x / 4 + y / 4) % 2 == 0 {
            [0.9, 0.8, 0.7, 1.0]
        } else {
            [0.1, 0.2, 0.3, 1.0]
        }
    });
    img
}

fn inputs(size: [u32; 2]) -> FrameInputs {
    let camera = CameraParams::perspective(60.0, size[0] as f32 / size[1] as f32, 0.3, 100.0);
    FrameInputs::new(checker(size))
        .with_camera(camera)
        .with_gbuffer(glossy_gbuffer(size))
}

#[test]
fn zero_strength_effects_are_pixel_identical() {
    let renderer = FrameRenderer::new();
    let frame = inputs([40, 30]);
    let mut ssr = SsrConfig::default();
    ssr.reflection_multiplier = 0.0;
    let cases = [
        EffectConfig::Bloom(BloomConfig {
            intensity: 0.0,
            ..BloomConfig::default()
        }),
        EffectConfig::DepthOfField(DepthOfFieldConfig {
            near_radius: 0.0,
            far_radius: 0.0,
            ..DepthOfFieldConfig::default()
        }),
        EffectConfig::Vignette(VignetteConfig::default()),
        EffectConfig::LensDistort(LensDistortConfig::default()),
        EffectConfig::ScreenSpaceReflection(ssr),
    ];
    for case in &cases {
        let out = renderer.render_frame(&frame, std::slice::from_ref(case));
        assert_eq!(out, frame.color, "{case:?} changed pixels");
    }
    let out = renderer.render_frame(&frame, &cases);
    assert_eq!(out, frame.color);
    assert_eq!(renderer.pool().outstanding(), 0);
}

#[test]
fn bloom_threshold_above_every_pixel_adds_nothing() {
    let renderer = FrameRenderer::new();
    let gray = ImageBuffer::filled([256, 256], PixelFormat::Rgba16Float, [0.5, 0.5, 0.5, 1.0]);
    let frame = FrameInputs::new(gray);
    for high_quality in [false, true] {
        let bloom = EffectConfig::Bloom(BloomConfig {
            threshold: 1.0,
            intensity: 1.0,
            high_quality,
            ..BloomConfig::default()
        });
        let out = renderer.render_frame(&frame, &[bloom]);
        assert_eq!(out, frame.color);
    }
    assert_eq!(renderer.pool().outstanding(), 0);
}

#[test]
fn ssr_without_steps_returns_the_base_image() {
    let renderer = FrameRenderer::new();
    let frame = inputs([48, 32]);
    for half_resolution in [false, true] {
        let mut cfg = SsrConfig {
            half_resolution,
            ..SsrConfig::default()
        };
        cfg.trace.max_steps = 0;
        let out = renderer.render_frame(&frame, &[EffectConfig::ScreenSpaceReflection(cfg)]);
        assert_eq!(out, frame.color);
    }
    assert_eq!(renderer.pool().outstanding(), 0);
}

#[test]
fn depth_of_field_needs_depth() {
    let renderer = FrameRenderer::new();
    let frame = FrameInputs::new(checker([16, 16]));
    let dof = EffectConfig::DepthOfField(DepthOfFieldConfig::default());
    assert_eq!(renderer.render_frame(&frame, &[dof]), frame.color);
}

#[test]
fn blurry_dof_softens_the_checker() {
    let renderer = FrameRenderer::new();
    let frame = inputs([32, 32]);
    // Focus at the near plane so the whole floor is far-blurred.
    let dof = EffectConfig::DepthOfField(DepthOfFieldConfig {
        focus_plane: 0.0,
        far_radius: 6.0,
        near_radius: 6.0,
        f_stops: 1.0,
        ..DepthOfFieldConfig::default()
    });
    let out = renderer.render_frame(&frame, &[dof]);
    let contrast = |img: &ImageBuffer| (img.get(13, 13)[0] - img.get(17, 13)[0]).abs();
    assert!(contrast(&out) < contrast(&frame.color));
    assert_eq!(renderer.pool().outstanding(), 0);
}

#[test]
fn removed_kernel_returns_the_source_frame() {
    let mut renderer = FrameRenderer::new();
    assert!(renderer.executor_mut().unregister(pass::BLUR_HORIZONTAL));
    let frame = inputs([32, 32]);
    let effects = [
        EffectConfig::Vignette(VignetteConfig {
            darken: 1.0,
            ..VignetteConfig::default()
        }),
        EffectConfig::Bloom(BloomConfig {
            threshold: 0.0,
            intensity: 2.0,
            ..BloomConfig::default()
        }),
    ];
    let out = renderer.render_frame(&frame, &effects);
    assert_eq!(out, frame.color);
    assert_eq!(renderer.pool().outstanding(), 0);
}

#[test]
fn frame_json_drives_the_chain() {
    let frame = dsl::parse_frame_json(
        &json!({
            "version": "1.0",
            "metadata": { "name": "chain" },
            "camera": { "fovY": 50.0, "near": 0.3, "far": 100.0 },
            "effects": [
                { "id": "bloom", "type": "Bloom", "params": { "threshold": 0.5, "intensity": 1.0 } },
                { "id": "vig", "type": "Vignette", "params": { "darken": 0.8 } },
                { "id": "lens", "type": "LensDistort", "enabled": false, "params": { "amount": 40 } }
            ]
        })
        .to_string(),
    )
    .unwrap();
    let effects = dsl::effect_configs(&frame).unwrap();
    assert_eq!(effects.len(), 2);

    let renderer = FrameRenderer::new();
    let color = checker([24, 24]);
    let camera = dsl::frame_camera(&frame, color.size());
    let out = renderer.render_frame(&FrameInputs::new(color).with_camera(camera), &effects);
    assert_eq!(out.size(), [24, 24]);
    assert!(out.get(0, 0)[0] < out.get(12, 12)[0] + 1.0);
    assert_eq!(renderer.pool().outstanding(), 0);
}

#[test]
fn invalid_frame_json_is_rejected_with_all_errors() {
    let frame = dsl::parse_frame_json(
        &json!({
            "version": "1.0",
            "metadata": { "name": "bad" },
            "effects": [
                { "id": "x", "type": "Sharpen" },
                { "id": "y", "type": "ScreenSpaceReflection", "params": { "maxSteps": "many" } }
            ]
        })
        .to_string(),
    )
    .unwrap();
    let err = format!("{:#}", dsl::effect_configs(&frame).unwrap_err());
    assert!(err.contains("2 error(s)"), "{err}");
    assert!(err.contains("Sharpen"));
    assert!(err.contains("y.maxSteps"));
}
