//! Screen-space reflection kernels.
//!
//! Buffer layouts:
//! - key: `(normal.x, normal.y encoded, smoothness, depth / far)`
//! - hits: `Rgba32Float (u, v, distance, weight)`, zero for non-hits
//! - reflection: colour premultiplied by coverage, `(rgb * w, w)`
//! - resolved: `(rgb, coverage)`

use crate::renderer::{
    camera::{CameraParams, vec3_dot, vec3_normalize},
    composite::{fresnel_fade, roughness_falloff},
    error::RenderResult,
    executor::PassKernel,
    pass_spec::{IDENTITY_MAT4, OutputSize, PassParams},
    ray_march::{GBufferView, TraceSettings, trace},
    sampler::{bilinear_taps, lerp_rgba, sample, sample_bilinear, sample_nearest, saturate},
    types::{ImageBuffer, Rgba},
};

// ── Parameter plumbing ───────────────────────────────────────────────────

pub fn camera_params(camera: &CameraParams) -> PassParams {
    PassParams::new()
        .with_mat4("projection", camera.projection)
        .with_vec2("clip", [camera.near, camera.far])
}

fn camera_from(params: &PassParams) -> CameraParams {
    let [near, far] = params.vec2_or("clip", [0.3, 1000.0]);
    CameraParams::from_projection(params.mat4_or("projection", IDENTITY_MAT4), near, far)
}

/// Trace settings packed for the `ssr-trace` pass, plus the camera.
pub fn trace_params(settings: &TraceSettings, camera: &CameraParams) -> PassParams {
    camera_params(camera)
        .with_i32("max_steps", settings.max_steps as i32)
        .with_i32("ray_pixels_step", settings.ray_pixels_step as i32)
        .with_vec4(
            "distances",
            [
                settings.max_distance,
                settings.fade_distance,
                settings.wall_thickness,
                settings.screen_edge_fade,
            ],
        )
        .with_vec2(
            "smoothness",
            [settings.min_smoothness, settings.smoothness_falloff_range],
        )
        .with_bool("reduce_banding", settings.reduce_banding)
        .with_bool("backface_miss", settings.treat_backface_hit_as_miss)
        .with_bool("suppress_backwards", settings.suppress_backwards_rays)
        .with_bool("trace_everywhere", settings.trace_everywhere)
}

fn settings_from(params: &PassParams) -> TraceSettings {
    let d = TraceSettings::default();
    let [max_distance, fade_distance, wall_thickness, screen_edge_fade] = params.vec4_or(
        "distances",
        [d.max_distance, d.fade_distance, d.wall_thickness, d.screen_edge_fade],
    );
    let [min_smoothness, smoothness_falloff_range] =
        params.vec2_or("smoothness", [d.min_smoothness, d.smoothness_falloff_range]);
    TraceSettings {
        max_steps: params.i32_or("max_steps", d.max_steps as i32).max(0) as u32,
        ray_pixels_step: params.i32_or("ray_pixels_step", 0).max(0) as u32,
        max_distance,
        fade_distance,
        wall_thickness,
        screen_edge_fade,
        reduce_banding: params.bool_or("reduce_banding", d.reduce_banding),
        treat_backface_hit_as_miss: params.bool_or("backface_miss", false),
        suppress_backwards_rays: params.bool_or("suppress_backwards", false),
        trace_everywhere: params.bool_or("trace_everywhere", false),
        min_smoothness,
        smoothness_falloff_range,
    }
    .clamped()
}

fn decode_key_normal(key: Rgba) -> Option<[f32; 3]> {
    let x = key[0] * 2.0 - 1.0;
    let y = key[1] * 2.0 - 1.0;
    let z = (1.0 - x * x - y * y).max(0.0).sqrt();
    vec3_normalize([x, y, z])
}

// ── Passes ───────────────────────────────────────────────────────────────

/// Pack the edge-stopping key for bilateral upsampling.
///
/// Sources: `[depth, normals]`. Params: `clip` (vec2 near/far).
pub struct BilateralKeyPack;

impl PassKernel for BilateralKeyPack {
    fn min_sources(&self) -> usize {
        2
    }

    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let (depth, normals) = (sources[0], sources[1]);
        let far = params.vec2_or("clip", [0.3, 1000.0])[1].max(1e-4);
        dest.fill_with(|x, y| {
            let uv = depth.texel_uv(x, y);
            let n = sample_nearest(normals, uv);
            let z = depth.get(x, y)[0];
            [n[0], n[1], n[3], saturate(z / far)]
        });
        Ok(())
    }
}

/// Ray-march every destination texel.
///
/// Sources: `[depth, normals]`. Destination size picks the trace resolution.
pub struct Trace;

impl PassKernel for Trace {
    fn min_sources(&self) -> usize {
        2
    }

    fn output_size(&self) -> OutputSize {
        OutputSize::Any
    }

    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let gbuffer = GBufferView {
            depth: sources[0],
            normals: sources[1],
        };
        let camera = camera_from(params);
        let hits = trace(gbuffer, &camera, &settings_from(params), dest.size());
        hits.write_to(dest);
        Ok(())
    }
}

/// Fetch scene colour at each hit, premultiplied by hit weight.
///
/// Sources: `[color, hits]`; output matches the hit buffer.
pub struct HitToReflection;

impl PassKernel for HitToReflection {
    fn min_sources(&self) -> usize {
        2
    }

    fn output_size(&self) -> OutputSize {
        OutputSize::MatchSource(1)
    }

    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        _params: &PassParams,
    ) -> RenderResult<()> {
        let (color, hits) = (sources[0], sources[1]);
        dest.fill_with(|x, y| {
            let hit = hits.get(x, y);
            let w = saturate(hit[3]);
            if w <= 0.0 {
                return [0.0; 4];
            }
            let c = sample_bilinear(color, [hit[0], hit[1]]);
            [c[0] * w, c[1] * w, c[2] * w, w]
        });
        Ok(())
    }
}

/// Bilinear fetch of `level` at `uv`, with taps reweighted by key similarity
/// against the centre texel's normal and depth.
fn bilateral_sample(level: &ImageBuffer, key: &ImageBuffer, uv: [f32; 2], center: Rgba) -> Rgba {
    let (taps, weights) = bilinear_taps(level.size(), uv);
    let center_n = decode_key_normal(center);
    let [lw, lh] = level.size();
    let mut acc = [0.0f32; 4];
    let mut wsum = 0.0f32;
    for (tap, bw) in taps.iter().zip(weights) {
        if bw <= 0.0 {
            continue;
        }
        let tap_uv = [
            (tap[0].clamp(0, lw as i64 - 1) as f32 + 0.5) / lw as f32,
            (tap[1].clamp(0, lh as i64 - 1) as f32 + 0.5) / lh as f32,
        ];
        let k = sample_nearest(key, tap_uv);
        let normal_w = match (center_n, decode_key_normal(k)) {
            (Some(a), Some(b)) => saturate(vec3_dot(a, b)).powi(8),
            _ => 1.0,
        };
        let depth_w = 1.0 / (1e-3 + (k[3] - center[3]).abs() * 100.0);
        let w = bw * normal_w * depth_w;
        let px = level.load(tap[0], tap[1]);
        for c in 0..4 {
            acc[c] += px[c] * w;
        }
        wsum += w;
    }
    if wsum <= 1e-8 {
        return sample_bilinear(level, uv);
    }
    acc.map(|v| v / wsum)
}

/// Blurry-reflection resolve over the reflection pyramid.
///
/// Sources: `[key, hits, level0, level1, ...]`. Params: `clip`, `projection`,
/// `fresnel` (vec2 fade/power), `smoothness` (vec2 min/falloff),
/// `multiplier`, `distance_blur`, `max_distance`, `bilateral` (bool).
pub struct Resolve;

impl PassKernel for Resolve {
    fn min_sources(&self) -> usize {
        3
    }

    fn output_size(&self) -> OutputSize {
        OutputSize::Any
    }

    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let (key, hits, levels) = (sources[0], sources[1], &sources[2..]);
        let camera = camera_from(params);
        let [fresnel_amount, fresnel_power] = params.vec2_or("fresnel", [1.0, 1.0]);
        let [min_smooth, falloff] = params.vec2_or("smoothness", [0.5, 0.2]);
        let multiplier = params.f32_or("multiplier", 1.0).max(0.0);
        let distance_blur = saturate(params.f32_or("distance_blur", 1.0));
        let max_distance = params.f32_or("max_distance", 100.0).max(1e-4);
        let bilateral = params.bool_or("bilateral", false);
        let top = (levels.len() - 1) as f32;
        let [w, h] = dest.size();

        dest.fill_with(|x, y| {
            let uv = [(x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32];
            let k = sample_nearest(key, uv);
            let hit = sample_nearest(hits, uv);
            let smoothness = k[2];
            let roughness = 1.0 - smoothness;
            let blur = roughness + distance_blur * saturate(hit[2] / max_distance);
            let lod = (saturate(blur) * top).clamp(0.0, top);
            let lo = lod.floor() as usize;
            let hi = (lo + 1).min(levels.len() - 1);
            let fetch = |i: usize| {
                let level = levels[i];
                if bilateral && level.width() < w {
                    bilateral_sample(level, key, uv, k)
                } else {
                    sample(level, uv)
                }
            };
            let mut refl = fetch(lo);
            if hi != lo {
                refl = lerp_rgba(refl, fetch(hi), lod - lo as f32);
            }
            let cov = refl[3];
            if cov <= 1e-6 {
                return [0.0; 4];
            }

            let n_dot_v = decode_key_normal(k)
                .and_then(|n| {
                    let view = camera.view_position(uv, k[3] * camera.far);
                    let to_eye = vec3_normalize([-view[0], -view[1], -view[2]])?;
                    Some(vec3_dot(n, to_eye))
                })
                .unwrap_or(1.0);
            let coverage = saturate(
                cov.min(1.0)
                    * fresnel_fade(n_dot_v, fresnel_amount, fresnel_power)
                    * roughness_falloff(smoothness, min_smooth, falloff)
                    * multiplier,
            );
            [refl[0] / cov, refl[1] / cov, refl[2] / cov, coverage]
        });
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum DebugView {
    #[default]
    None,
    SsrResult,
    SsrMask,
    Roughness,
}

impl DebugView {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "ssr-result" => Some(Self::SsrResult),
            "ssr-mask" => Some(Self::SsrMask),
            "roughness" => Some(Self::Roughness),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    fn from_code(code: i32) -> Self {
        match code {
            1 => Self::SsrResult,
            2 => Self::SsrMask,
            3 => Self::Roughness,
            _ => Self::None,
        }
    }
}

/// Blend resolved reflections over the base image.
///
/// Sources: `[base, resolved]` plus an optional `key` for the roughness view.
/// Params: `additive` (bool), `debug` (int, [`DebugView::code`]).
pub struct CompositeFinal;

impl PassKernel for CompositeFinal {
    fn min_sources(&self) -> usize {
        2
    }

    fn execute(
        &self,
        sources: &[&ImageBuffer],
        dest: &mut ImageBuffer,
        params: &PassParams,
    ) -> RenderResult<()> {
        let (base, resolved) = (sources[0], sources[1]);
        let key = sources.get(2).copied();
        let additive = params.bool_or("additive", false);
        let debug = DebugView::from_code(params.i32_or("debug", 0));
        dest.fill_with(|x, y| {
            let b = base.get(x, y);
            let uv = base.texel_uv(x, y);
            let r = sample_bilinear(resolved, uv);
            let w = saturate(r[3]);
            match debug {
                DebugView::SsrResult => return [r[0] * w, r[1] * w, r[2] * w, b[3]],
                DebugView::SsrMask => return [w, w, w, b[3]],
                DebugView::Roughness => {
                    let rough = key.map(|k| 1.0 - sample_nearest(k, uv)[2]).unwrap_or(0.0);
                    return [rough, rough, rough, b[3]];
                }
                DebugView::None => {}
            }
            if w <= 0.0 {
                return b;
            }
            if additive {
                [b[0] + r[0] * w, b[1] + r[1] * w, b[2] + r[2] * w, b[3]]
            } else {
                let mut out = lerp_rgba(b, r, w);
                out[3] = b[3];
                out
            }
        });
        Ok(())
    }
}
