//! Per-frame camera parameters and the screen/view conversions the
//! depth-driven effects need.
//!
//! Matrices are column-major `[f32; 16]`, OpenGL convention: the view looks
//! down -Z and clip-space depth spans `[-w, w]`. Screen UV `(0, 0)` is the
//! top-left corner; row 0 is the top of the image.

const EPSILON: f32 = 1e-6;

pub const DEFAULT_FOV_Y_DEG: f32 = 60.0;
pub const DEFAULT_NEAR: f32 = 0.3;
pub const DEFAULT_FAR: f32 = 1000.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraParams {
    pub projection: [f32; 16],
    pub near: f32,
    pub far: f32,
    pub fov_y_deg: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self::perspective(DEFAULT_FOV_Y_DEG, 1.0, DEFAULT_NEAR, DEFAULT_FAR)
    }
}

impl CameraParams {
    /// Symmetric perspective camera. Degenerate inputs are clamped so the
    /// result is always invertible.
    pub fn perspective(fov_y_deg: f32, aspect: f32, near: f32, far: f32) -> Self {
        let fov_y_deg = if fov_y_deg.is_finite() {
            fov_y_deg.clamp(1.0, 179.0)
        } else {
            DEFAULT_FOV_Y_DEG
        };
        let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
        let near = if near.is_finite() && near > 0.0 { near } else { DEFAULT_NEAR };
        let far = if far.is_finite() && far > near { far } else { near * 1000.0 };
        Self {
            projection: perspective_matrix(fov_y_deg.to_radians(), aspect, near, far),
            near,
            far,
            fov_y_deg,
        }
    }

    /// Wrap a caller-supplied projection; fov is recovered from `m[5]`.
    pub fn from_projection(projection: [f32; 16], near: f32, far: f32) -> Self {
        let fy = projection[5];
        let fov_y_deg = if fy.abs() > EPSILON {
            (2.0 * (1.0 / fy).atan()).to_degrees().abs()
        } else {
            DEFAULT_FOV_Y_DEG
        };
        Self {
            projection,
            near: near.max(EPSILON),
            far: far.max(near + EPSILON),
            fov_y_deg,
        }
    }

    /// Lens focal length for a 35mm-equivalent sensor half-height of 17.5.
    pub fn focal_length(&self) -> f32 {
        17.5 / (0.5 * self.fov_y_deg.to_radians()).tan()
    }

    /// View-space position of the surface seen at `uv` with linear depth `depth`.
    pub fn view_position(&self, uv: [f32; 2], depth: f32) -> [f32; 3] {
        let m = &self.projection;
        let ndc_x = uv[0] * 2.0 - 1.0;
        let ndc_y = 1.0 - uv[1] * 2.0;
        let sx = if m[0].abs() > EPSILON { m[0] } else { 1.0 };
        let sy = if m[5].abs() > EPSILON { m[5] } else { 1.0 };
        [
            depth * (ndc_x + m[8]) / sx,
            depth * (ndc_y + m[9]) / sy,
            -depth,
        ]
    }

    /// Project a view-space point to `(uv, w)`; `None` when it sits on or
    /// behind the eye plane.
    pub fn project(&self, view: [f32; 3]) -> Option<([f32; 2], f32)> {
        let clip = mat4_mul_vec4(&self.projection, [view[0], view[1], view[2], 1.0]);
        if clip[3] <= EPSILON {
            return None;
        }
        let ndc = [clip[0] / clip[3], clip[1] / clip[3]];
        Some(([(ndc[0] + 1.0) * 0.5, (1.0 - ndc[1]) * 0.5], clip[3]))
    }
}

pub fn perspective_matrix(fovy_radians: f32, aspect: f32, near: f32, far: f32) -> [f32; 16] {
    let f = 1.0 / (0.5 * fovy_radians).tan();
    let z_scale = (far + near) / (near - far);
    let z_translate = (2.0 * far * near) / (near - far);

    [
        f / aspect,
        0.0,
        0.0,
        0.0,
        0.0,
        f,
        0.0,
        0.0,
        0.0,
        0.0,
        z_scale,
        -1.0,
        0.0,
        0.0,
        z_translate,
        0.0,
    ]
}

pub fn mat4_mul_vec4(m: &[f32; 16], v: [f32; 4]) -> [f32; 4] {
    let mut out = [0.0f32; 4];
    for (row, o) in out.iter_mut().enumerate() {
        *o = m[row] * v[0] + m[4 + row] * v[1] + m[8 + row] * v[2] + m[12 + row] * v[3];
    }
    out
}

// ── vec3 helpers ─────────────────────────────────────────────────────────

pub fn vec3_dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn vec3_length(v: [f32; 3]) -> f32 {
    vec3_dot(v, v).sqrt()
}

/// Unit vector, or `None` for a (near) zero vector.
pub fn vec3_normalize(v: [f32; 3]) -> Option<[f32; 3]> {
    let len = vec3_length(v);
    if len <= EPSILON || !len.is_finite() {
        return None;
    }
    Some([v[0] / len, v[1] / len, v[2] / len])
}

/// Mirror incident direction `i` about unit normal `n`.
pub fn vec3_reflect(i: [f32; 3], n: [f32; 3]) -> [f32; 3] {
    let d = 2.0 * vec3_dot(i, n);
    [i[0] - d * n[0], i[1] - d * n[1], i[2] - d * n[2]]
}
