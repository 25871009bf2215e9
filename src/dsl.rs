use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::{
    color::parse_color,
    renderer::{
        camera::{CameraParams, DEFAULT_FAR, DEFAULT_FOV_Y_DEG, DEFAULT_NEAR},
        effects::{
            ApertureShape, BloomBlend, BloomConfig, DepthOfFieldConfig, DofMode, EffectConfig,
            LensDistortConfig, LensMode, SsrConfig, VignetteConfig,
        },
        kernels::ssr::DebugView,
        ray_march::TraceSettings,
    },
    schema,
};

pub type Params = HashMap<String, serde_json::Value>;

/// One frame's post-processing description.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FrameDSL {
    pub version: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub camera: Option<CameraDSL>,
    #[serde(default)]
    pub effects: Vec<EffectNode>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Metadata {
    pub name: String,
    pub created: Option<String>,
    pub modified: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CameraDSL {
    #[serde(rename = "fovY", default)]
    pub fov_y: Option<f32>,
    #[serde(default)]
    pub near: Option<f32>,
    #[serde(default)]
    pub far: Option<f32>,
    /// Column-major 4x4.
    #[serde(default)]
    pub projection: Option<Vec<f32>>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EffectNode {
    pub id: String,
    #[serde(rename = "type")]
    pub effect_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub params: Params,
}

pub fn parse_frame_json(text: &str) -> Result<FrameDSL> {
    let mut frame: FrameDSL = serde_json::from_str(text).context("failed to parse frame json")?;
    normalize_frame_defaults(&mut frame)?;
    Ok(frame)
}

pub fn load_frame_from_path(path: impl AsRef<std::path::Path>) -> Result<FrameDSL> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read frame json at {}", path.display()))?;
    parse_frame_json(&text).with_context(|| format!("in {}", path.display()))
}

/// Fill params each effect omits with the bundled scheme's defaults.
pub fn normalize_frame_defaults(frame: &mut FrameDSL) -> Result<()> {
    let scheme = schema::load_default_scheme()?;
    for effect in &mut frame.effects {
        let Some(effect_scheme) = scheme.effects.get(&effect.effect_type) else {
            continue;
        };
        let mut merged = effect_scheme.default_params();
        for (k, v) in std::mem::take(&mut effect.params) {
            merged.insert(k, v);
        }
        effect.params = merged;
    }
    Ok(())
}

// ── Param readers ────────────────────────────────────────────────────────

pub fn parse_f32(params: &Params, key: &str) -> Option<f32> {
    match params.get(key) {
        Some(v) => v
            .as_f64()
            .map(|x| x as f32)
            .or_else(|| v.as_u64().map(|x| x as f32))
            .or_else(|| v.as_i64().map(|x| x as f32)),
        None => None,
    }
}

pub fn parse_i64(params: &Params, key: &str) -> Option<i64> {
    let v = params.get(key)?;
    v.as_i64().or_else(|| {
        v.as_f64()
            .filter(|x| x.is_finite() && x.fract() == 0.0)
            .map(|x| x as i64)
    })
}

pub fn parse_bool(params: &Params, key: &str) -> Option<bool> {
    let v = params.get(key)?;
    v.as_bool().or_else(|| v.as_f64().map(|x| x != 0.0))
}

pub fn parse_str<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

pub fn parse_vec<const N: usize>(params: &Params, key: &str) -> Option<[f32; N]> {
    let arr = params.get(key)?.as_array()?;
    if arr.len() != N {
        return None;
    }
    let mut out = [0.0f32; N];
    for (o, v) in out.iter_mut().zip(arr) {
        *o = v.as_f64()? as f32;
    }
    Some(out)
}

fn parse_enum<T>(
    effect: &EffectNode,
    key: &str,
    fallback: T,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T> {
    match parse_str(&effect.params, key) {
        None => Ok(fallback),
        Some(s) => parse(s).ok_or_else(|| anyhow!("effect '{}': invalid {key} '{s}'", effect.id)),
    }
}

// ── Typed configs ────────────────────────────────────────────────────────

/// Camera for a frame rendered at `size`. An explicit projection wins over
/// `fovY`; missing values use the defaults.
pub fn frame_camera(frame: &FrameDSL, size: [u32; 2]) -> CameraParams {
    let cam = frame.camera.clone().unwrap_or_default();
    let near = cam.near.unwrap_or(DEFAULT_NEAR);
    let far = cam.far.unwrap_or(DEFAULT_FAR);
    if let Some(m) = cam.projection.as_deref().and_then(|p| <[f32; 16]>::try_from(p).ok()) {
        return CameraParams::from_projection(m, near, far);
    }
    let aspect = size[0] as f32 / size[1].max(1) as f32;
    CameraParams::perspective(cam.fov_y.unwrap_or(DEFAULT_FOV_Y_DEG), aspect, near, far)
}

fn bloom_config(e: &EffectNode) -> Result<BloomConfig> {
    let p = &e.params;
    let d = BloomConfig::default();
    let tint = match p.get("tint") {
        Some(v) => parse_color(v).with_context(|| format!("effect '{}': tint", e.id))?,
        None => d.tint,
    };
    Ok(BloomConfig {
        threshold: parse_f32(p, "threshold").unwrap_or(d.threshold),
        intensity: parse_f32(p, "intensity").unwrap_or(d.intensity),
        blur_amount: parse_f32(p, "blurAmount").unwrap_or(d.blur_amount),
        spread_amount: parse_f32(p, "spreadAmount").unwrap_or(d.spread_amount),
        tint,
        kernel_size: parse_f32(p, "kernelSize").unwrap_or(d.kernel_size),
        blur_kernel_scale: parse_f32(p, "blurKernelScale").unwrap_or(d.blur_kernel_scale),
        spread_kernel_scale: parse_f32(p, "spreadKernelScale").unwrap_or(d.spread_kernel_scale),
        blend: parse_enum(e, "blendMode", d.blend, BloomBlend::parse)?,
        high_quality: parse_bool(p, "highQuality").unwrap_or(d.high_quality),
    }
    .clamped())
}

fn dof_config(e: &EffectNode) -> Result<DepthOfFieldConfig> {
    let p = &e.params;
    let d = DepthOfFieldConfig::default();
    Ok(DepthOfFieldConfig {
        mode: parse_enum(e, "mode", d.mode, DofMode::parse)?,
        shape: parse_enum(e, "apertureShape", d.shape, ApertureShape::parse)?,
        visualize: parse_bool(p, "visualize").unwrap_or(d.visualize),
        near_plane: parse_f32(p, "nearPlane").unwrap_or(d.near_plane),
        near_radius: parse_f32(p, "nearRadius").unwrap_or(d.near_radius),
        focus_plane: parse_f32(p, "focusPlane").unwrap_or(d.focus_plane),
        focus_range: parse_f32(p, "focusRange").unwrap_or(d.focus_range),
        far_plane: parse_f32(p, "farPlane").unwrap_or(d.far_plane),
        far_radius: parse_f32(p, "farRadius").unwrap_or(d.far_radius),
        boost_point: parse_f32(p, "boostPoint").unwrap_or(d.boost_point),
        near_boost: parse_f32(p, "nearBoostAmount").unwrap_or(d.near_boost),
        far_boost: parse_f32(p, "farBoostAmount").unwrap_or(d.far_boost),
        f_stops: parse_f32(p, "fStops").unwrap_or(d.f_stops),
    }
    .clamped())
}

fn vignette_config(e: &EffectNode) -> VignetteConfig {
    let p = &e.params;
    let d = VignetteConfig::default();
    VignetteConfig {
        radius: parse_f32(p, "radius").unwrap_or(d.radius),
        spread: parse_f32(p, "spread").unwrap_or(d.spread),
        darken: parse_f32(p, "darken").unwrap_or(d.darken),
        desaturate: parse_f32(p, "desaturate").unwrap_or(d.desaturate),
        blur: parse_f32(p, "blur").unwrap_or(d.blur),
    }
    .clamped()
}

fn lens_config(e: &EffectNode) -> Result<LensDistortConfig> {
    let p = &e.params;
    let d = LensDistortConfig::default();
    Ok(LensDistortConfig {
        mode: parse_enum(e, "mode", d.mode, LensMode::parse)?,
        amount: parse_f32(p, "amount").unwrap_or(d.amount),
        center: parse_vec::<2>(p, "center").unwrap_or(d.center),
        axis_amount: [
            parse_f32(p, "amountX").unwrap_or(d.axis_amount[0]),
            parse_f32(p, "amountY").unwrap_or(d.axis_amount[1]),
        ],
        chromatic_aberration: parse_f32(p, "chromaticAberration")
            .unwrap_or(d.chromatic_aberration),
        scale: parse_f32(p, "scale").unwrap_or(d.scale),
        oversampling: parse_bool(p, "oversampling").unwrap_or(d.oversampling),
    }
    .clamped())
}

fn ssr_config(e: &EffectNode) -> Result<SsrConfig> {
    let p = &e.params;
    let d = SsrConfig::default();
    let t = TraceSettings::default();
    let steps = |key: &str, fallback: u32| {
        parse_i64(p, key)
            .map(|v| v.clamp(0, u32::MAX as i64) as u32)
            .unwrap_or(fallback)
    };
    let trace = TraceSettings {
        max_steps: steps("maxSteps", t.max_steps),
        ray_pixels_step: steps("rayPixelsStep", t.ray_pixels_step),
        max_distance: parse_f32(p, "maxDistance").unwrap_or(t.max_distance),
        fade_distance: parse_f32(p, "fadeDistance").unwrap_or(t.fade_distance),
        wall_thickness: parse_f32(p, "wallThickness").unwrap_or(t.wall_thickness),
        screen_edge_fade: parse_f32(p, "screenEdgeFade").unwrap_or(t.screen_edge_fade),
        reduce_banding: parse_bool(p, "reduceBanding").unwrap_or(t.reduce_banding),
        treat_backface_hit_as_miss: parse_bool(p, "treatBackfaceHitAsMiss")
            .unwrap_or(t.treat_backface_hit_as_miss),
        suppress_backwards_rays: parse_bool(p, "suppressBackwardsRays")
            .unwrap_or(t.suppress_backwards_rays),
        trace_everywhere: parse_bool(p, "traceEverywhere").unwrap_or(t.trace_everywhere),
        min_smoothness: parse_f32(p, "minSmoothness").unwrap_or(t.min_smoothness),
        smoothness_falloff_range: parse_f32(p, "smoothnessFalloffRange")
            .unwrap_or(t.smoothness_falloff_range),
    };
    Ok(SsrConfig {
        enable_ssr: parse_bool(p, "enableSSR").unwrap_or(d.enable_ssr),
        trace,
        half_resolution: parse_bool(p, "halfResolution").unwrap_or(d.half_resolution),
        additive: parse_bool(p, "additiveReflection").unwrap_or(d.additive),
        reflection_multiplier: parse_f32(p, "reflectionMultiplier")
            .unwrap_or(d.reflection_multiplier),
        distance_blur: parse_f32(p, "distanceBlur").unwrap_or(d.distance_blur),
        fresnel_fade: parse_f32(p, "fresnelFade").unwrap_or(d.fresnel_fade),
        fresnel_power: parse_f32(p, "fresnelFadePower").unwrap_or(d.fresnel_power),
        bilateral_upsample: parse_bool(p, "bilateralUpsample").unwrap_or(d.bilateral_upsample),
        full_res_resolve: parse_bool(p, "fullResolutionResolve").unwrap_or(d.full_res_resolve),
        debug: parse_enum(e, "debugView", d.debug, DebugView::parse)?,
        use_hdr_intermediates: parse_bool(p, "useHdrIntermediates")
            .unwrap_or(d.use_hdr_intermediates),
    }
    .clamped())
}

pub fn effect_config(effect: &EffectNode) -> Result<EffectConfig> {
    Ok(match effect.effect_type.as_str() {
        "Bloom" => EffectConfig::Bloom(bloom_config(effect)?),
        "DepthOfField" => EffectConfig::DepthOfField(dof_config(effect)?),
        "Vignette" => EffectConfig::Vignette(vignette_config(effect)),
        "LensDistort" => EffectConfig::LensDistort(lens_config(effect)?),
        "ScreenSpaceReflection" => EffectConfig::ScreenSpaceReflection(ssr_config(effect)?),
        other => return Err(anyhow!("effect '{}': unknown type '{other}'", effect.id)),
    })
}

/// Validate `frame` and build the typed chain of its enabled effects, in order.
pub fn effect_configs(frame: &FrameDSL) -> Result<Vec<EffectConfig>> {
    schema::validate_frame(frame)?;
    frame
        .effects
        .iter()
        .filter(|e| e.enabled)
        .map(effect_config)
        .collect()
}
