//! Screen-space reflection ray march.
//!
//! Each pixel reflects the view ray about its G-buffer normal, projects the
//! reflected segment to screen space, and walks it with a DDA along the
//! major axis. Depth along the ray is interpolated perspective-correctly
//! (linear in `1 / w`). The walk is a small state machine over [`RayState`].

use crate::renderer::{
    camera::{CameraParams, vec3_dot, vec3_length, vec3_normalize, vec3_reflect},
    composite::{distance_fade, screen_edge_fade},
    sampler::sample_nearest,
    types::ImageBuffer,
};

/// Upper bound on march iterations per ray.
pub const MAX_TRACE_STEPS: u32 = 2048;
/// Largest `ray_pixels_step` exponent (stride 16).
pub const MAX_RAY_PIXELS_STEP: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceSettings {
    pub max_steps: u32,
    /// Stride exponent: the ray advances `1 << ray_pixels_step` pixels per step.
    pub ray_pixels_step: u32,
    /// World units.
    pub max_distance: f32,
    /// World units before `max_distance` over which hits fade out.
    pub fade_distance: f32,
    pub wall_thickness: f32,
    pub screen_edge_fade: f32,
    pub reduce_banding: bool,
    pub treat_backface_hit_as_miss: bool,
    pub suppress_backwards_rays: bool,
    pub trace_everywhere: bool,
    pub min_smoothness: f32,
    pub smoothness_falloff_range: f32,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            max_steps: 128,
            ray_pixels_step: 3,
            max_distance: 100.0,
            fade_distance: 100.0,
            wall_thickness: 0.5,
            screen_edge_fade: 0.03,
            reduce_banding: true,
            treat_backface_hit_as_miss: false,
            suppress_backwards_rays: false,
            trace_everywhere: false,
            min_smoothness: 0.2,
            smoothness_falloff_range: 0.05,
        }
    }
}

impl TraceSettings {
    /// Clamp every field into its documented range.
    pub fn clamped(mut self) -> Self {
        self.max_steps = self.max_steps.min(MAX_TRACE_STEPS);
        self.ray_pixels_step = self.ray_pixels_step.min(MAX_RAY_PIXELS_STEP);
        self.max_distance = finite_or(self.max_distance, 100.0).clamp(0.0, 1000.0);
        self.fade_distance = finite_or(self.fade_distance, 0.0).clamp(0.0, 1000.0);
        self.wall_thickness = finite_or(self.wall_thickness, 0.5).clamp(0.0, 10.0);
        self.screen_edge_fade = finite_or(self.screen_edge_fade, 0.0).clamp(0.0, 1.0);
        self.min_smoothness = finite_or(self.min_smoothness, 0.2).clamp(0.0, 1.0);
        self.smoothness_falloff_range = finite_or(self.smoothness_falloff_range, 0.0).clamp(0.0, 0.2);
        self
    }

    pub fn stride(&self) -> u32 {
        1 << self.ray_pixels_step.min(MAX_RAY_PIXELS_STEP)
    }
}

fn finite_or(v: f32, fallback: f32) -> f32 {
    if v.is_finite() { v } else { fallback }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RayState {
    Marching,
    Hit,
    Miss,
    OutOfBounds,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Hit position in trace-resolution pixels (sub-pixel).
    pub position: [f32; 2],
    pub state: RayState,
    pub steps: u32,
    /// View-space distance from the reflecting surface to the hit.
    pub distance: f32,
    pub weight: f32,
}

impl RayHit {
    fn terminal(state: RayState, steps: u32) -> Self {
        Self {
            position: [0.0, 0.0],
            state,
            steps,
            distance: 0.0,
            weight: 0.0,
        }
    }

    pub fn miss(steps: u32) -> Self {
        Self::terminal(RayState::Miss, steps)
    }

    /// Only hits may be sampled; misses fall back to the environment.
    pub fn valid(&self) -> bool {
        self.state == RayState::Hit
    }
}

/// Linear depth in R; normals encoded `n * 0.5 + 0.5` in RGB with smoothness in A.
#[derive(Clone, Copy, Debug)]
pub struct GBufferView<'a> {
    pub depth: &'a ImageBuffer,
    pub normals: &'a ImageBuffer,
}

impl GBufferView<'_> {
    pub fn depth_at(&self, uv: [f32; 2]) -> f32 {
        sample_nearest(self.depth, uv)[0]
    }

    /// `(view-space normal, smoothness)`; `None` for an undecodable normal.
    pub fn normal_at(&self, uv: [f32; 2]) -> Option<([f32; 3], f32)> {
        let enc = sample_nearest(self.normals, uv);
        let n = vec3_normalize([enc[0] * 2.0 - 1.0, enc[1] * 2.0 - 1.0, enc[2] * 2.0 - 1.0])?;
        Some((n, enc[3].clamp(0.0, 1.0)))
    }
}

/// Per-pixel trace results at the trace resolution.
#[derive(Clone, Debug)]
pub struct HitBuffer {
    size: [u32; 2],
    hits: Vec<RayHit>,
}

impl HitBuffer {
    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    pub fn get(&self, x: u32, y: u32) -> &RayHit {
        &self.hits[(y * self.size[0] + x) as usize]
    }

    pub fn hits(&self) -> &[RayHit] {
        &self.hits
    }

    /// Encode as `(u, v, distance, weight)`; non-hits are all zero.
    pub fn write_to(&self, dest: &mut ImageBuffer) {
        let [w, h] = self.size;
        dest.fill_with(|x, y| {
            if x >= w || y >= h {
                return [0.0; 4];
            }
            let hit = self.get(x, y);
            if !hit.valid() {
                return [0.0; 4];
            }
            [
                hit.position[0] / w as f32,
                hit.position[1] / h as f32,
                hit.distance,
                hit.weight,
            ]
        });
    }
}

/// Trace every pixel of a `size` grid.
pub fn trace(
    gbuffer: GBufferView<'_>,
    camera: &CameraParams,
    settings: &TraceSettings,
    size: [u32; 2],
) -> HitBuffer {
    let settings = settings.clamped();
    let size = [size[0].max(1), size[1].max(1)];
    let mut hits = Vec::with_capacity(size[0] as usize * size[1] as usize);
    for y in 0..size[1] {
        for x in 0..size[0] {
            hits.push(trace_pixel(gbuffer, camera, &settings, size, x, y));
        }
    }
    HitBuffer { size, hits }
}

// ── Per-pixel march ──────────────────────────────────────────────────────

struct ScreenRay {
    origin: [f32; 2],
    /// Pixels per unit `t` (one unit = one pixel along the major axis).
    dir: [f32; 2],
    inv_w0: f32,
    d_inv_w: f32,
    length: f32,
}

impl ScreenRay {
    fn point(&self, t: f32) -> [f32; 2] {
        [self.origin[0] + self.dir[0] * t, self.origin[1] + self.dir[1] * t]
    }

    fn depth(&self, t: f32) -> f32 {
        1.0 / (self.inv_w0 + self.d_inv_w * t).max(1e-9)
    }
}

pub fn trace_pixel(
    gbuffer: GBufferView<'_>,
    camera: &CameraParams,
    settings: &TraceSettings,
    size: [u32; 2],
    x: u32,
    y: u32,
) -> RayHit {
    let [w, h] = [size[0] as f32, size[1] as f32];
    let uv = [(x as f32 + 0.5) / w, (y as f32 + 0.5) / h];

    let depth = gbuffer.depth_at(uv);
    if !(depth > 0.0 && depth < camera.far) {
        return RayHit::miss(0);
    }
    let Some((normal, smoothness)) = gbuffer.normal_at(uv) else {
        return RayHit::miss(0);
    };
    if !settings.trace_everywhere
        && smoothness < settings.min_smoothness - settings.smoothness_falloff_range
    {
        return RayHit::miss(0);
    }
    if settings.max_steps == 0 || settings.max_distance <= 0.0 {
        return RayHit::miss(0);
    }

    let origin = camera.view_position(uv, depth);
    let Some(view_dir) = vec3_normalize(origin) else {
        return RayHit::miss(0);
    };
    let refl = vec3_reflect(view_dir, normal);
    if settings.suppress_backwards_rays && refl[2] > 0.0 {
        return RayHit::miss(0);
    }

    // Clip the segment at the near plane.
    let mut len = settings.max_distance;
    let end_z = origin[2] + refl[2] * len;
    if end_z > -camera.near && refl[2] > 0.0 {
        len = ((-camera.near - origin[2]) / refl[2]).max(0.0);
    }
    let end = [
        origin[0] + refl[0] * len,
        origin[1] + refl[1] * len,
        origin[2] + refl[2] * len,
    ];
    let (Some((uv0, w0)), Some((uv1, w1))) = (camera.project(origin), camera.project(end)) else {
        return RayHit::miss(0);
    };

    let s0 = [uv0[0] * w, uv0[1] * h];
    let s1 = [uv1[0] * w, uv1[1] * h];
    let delta = [s1[0] - s0[0], s1[1] - s0[1]];
    let major = delta[0].abs().max(delta[1].abs());
    if !(major >= 1e-3) {
        return RayHit::miss(0);
    }
    let ray = ScreenRay {
        origin: s0,
        dir: [delta[0] / major, delta[1] / major],
        inv_w0: 1.0 / w0,
        d_inv_w: (1.0 / w1 - 1.0 / w0) / major,
        length: major,
    };

    let Some((position, steps)) = march(&ray, gbuffer, settings, size) else {
        return RayHit::miss(settings.max_steps);
    };
    let position = match position {
        Ok(p) => p,
        Err(state) => return RayHit::terminal(state, steps),
    };

    let hit_uv = [position[0] / w, position[1] / h];
    if settings.treat_backface_hit_as_miss {
        if let Some((hit_normal, _)) = gbuffer.normal_at(hit_uv) {
            if vec3_dot(hit_normal, refl) > 0.0 {
                return RayHit::miss(steps);
            }
        }
    }
    let hit_view = camera.view_position(hit_uv, gbuffer.depth_at(hit_uv));
    let distance = vec3_length([
        hit_view[0] - origin[0],
        hit_view[1] - origin[1],
        hit_view[2] - origin[2],
    ]);
    let weight = screen_edge_fade(hit_uv, settings.screen_edge_fade)
        * distance_fade(distance, settings.max_distance, settings.fade_distance);

    RayHit {
        position,
        state: RayState::Hit,
        steps,
        distance,
        weight,
    }
}

/// Walk the ray. `None` means the budget ran out while still marching;
/// `Some((Err(state), steps))` a terminal non-hit; `Some((Ok(pos), steps))` a hit.
fn march(
    ray: &ScreenRay,
    gbuffer: GBufferView<'_>,
    settings: &TraceSettings,
    size: [u32; 2],
) -> Option<(Result<[f32; 2], RayState>, u32)> {
    let [w, h] = [size[0] as f32, size[1] as f32];
    let mut stride = settings.stride() as f32;
    let mut refining = false;
    let mut state = RayState::Marching;
    let mut steps = 0u32;
    let mut prev_t = 0.0f32;

    while state == RayState::Marching {
        if steps >= settings.max_steps {
            return None;
        }
        steps += 1;
        let t = (prev_t + stride).min(ray.length);
        let p = ray.point(t);
        if !(p[0] >= 0.0 && p[0] < w && p[1] >= 0.0 && p[1] < h) {
            state = RayState::OutOfBounds;
            continue;
        }

        let scene = gbuffer.depth_at([p[0] / w, p[1] / h]);
        let z_prev = ray.depth(prev_t);
        let z_cur = ray.depth(t);
        let (ray_near, ray_far) = (z_prev.min(z_cur), z_prev.max(z_cur));
        let crossed = scene > 0.0 && ray_far >= scene && ray_near <= scene + settings.wall_thickness;

        if crossed {
            if settings.reduce_banding && stride > 1.0 && !refining {
                refining = true;
                stride = 1.0;
                continue;
            }
            let p = if settings.reduce_banding {
                let f = if (z_cur - z_prev).abs() > 1e-6 {
                    ((scene - z_prev) / (z_cur - z_prev)).clamp(0.0, 1.0)
                } else {
                    1.0
                };
                ray.point(prev_t + (t - prev_t) * f)
            } else {
                p
            };
            let clamped = [p[0].clamp(0.0, w - 1e-3), p[1].clamp(0.0, h - 1e-3)];
            return Some((Ok(clamped), steps));
        }

        if t >= ray.length {
            state = RayState::Miss;
            continue;
        }
        prev_t = t;
    }
    Some((Err(state), steps))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::types::PixelFormat;

    /// A camera looking at a mirror floor `y = -1` with a wall at `z = -6`.
    fn floor_and_wall(size: [u32; 2]) -> (ImageBuffer, ImageBuffer, CameraParams) {
        let cam = CameraParams::perspective(60.0, size[0] as f32 / size[1] as f32, 0.1, 100.0);
        let mut depth = ImageBuffer::new(size, PixelFormat::Rgba32Float);
        let mut normals = ImageBuffer::new(size, PixelFormat::Rgba32Float);
        let [w, h] = size;
        for y in 0..h {
            for x in 0..w {
                let uv = [(x as f32 + 0.5) / w as f32, (y as f32 + 0.5) / h as f32];
                // Direction through the pixel at unit depth.
                let dir = cam.view_position(uv, 1.0);
                let floor_t = if dir[1] < 0.0 { -1.0 / dir[1] } else { f32::INFINITY };
                let wall_t = 6.0;
                if floor_t < wall_t {
                    depth.set(x, y, [floor_t, 0.0, 0.0, 1.0]);
                    normals.set(x, y, [0.5, 1.0, 0.5, 1.0]);
                } else {
                    depth.set(x, y, [wall_t, 0.0, 0.0, 1.0]);
                    normals.set(x, y, [0.5, 0.5, 1.0, 0.2]);
                }
            }
        }
        (depth, normals, cam)
    }

    #[test]
    fn zero_max_steps_misses_everywhere() {
        let (depth, normals, cam) = floor_and_wall([32, 24]);
        let settings = TraceSettings {
            max_steps: 0,
            trace_everywhere: true,
            ..TraceSettings::default()
        };
        let hits = trace(GBufferView { depth: &depth, normals: &normals }, &cam, &settings, [32, 24]);
        assert!(hits.hits().iter().all(|h| h.state == RayState::Miss));
    }

    #[test]
    fn floor_reflects_the_wall() {
        let (depth, normals, cam) = floor_and_wall([64, 48]);
        let settings = TraceSettings {
            max_steps: 256,
            ray_pixels_step: 0,
            wall_thickness: 1.0,
            ..TraceSettings::default()
        };
        let hits = trace(GBufferView { depth: &depth, normals: &normals }, &cam, &settings, [64, 48]);
        let hit_count = hits.hits().iter().filter(|h| h.valid()).count();
        assert!(hit_count > 0, "expected some floor pixels to hit the wall");
        for hit in hits.hits().iter().filter(|h| h.valid()) {
            assert!(hit.steps <= settings.max_steps);
            assert!(hit.position[0] >= 0.0 && hit.position[0] < 64.0);
            assert!(hit.position[1] >= 0.0 && hit.position[1] < 48.0);
        }
    }

    #[test]
    fn rough_pixels_are_skipped_unless_tracing_everywhere() {
        let (depth, normals, cam) = floor_and_wall([16, 12]);
        let gb = GBufferView { depth: &depth, normals: &normals };
        let settings = TraceSettings {
            min_smoothness: 0.9,
            smoothness_falloff_range: 0.0,
            ..TraceSettings::default()
        };
        // Row 0 looks at the wall (smoothness 0.2).
        let hit = trace_pixel(gb, &cam, &settings, [16, 12], 8, 0);
        assert_eq!(hit, RayHit::miss(0));
    }

    #[test]
    fn stride_follows_pixel_step_exponent() {
        let s = TraceSettings {
            ray_pixels_step: 9,
            ..TraceSettings::default()
        }
        .clamped();
        assert_eq!(s.stride(), 16);
    }
}
