//! Texture sampling helpers.
//!
//! Kernels read their sources through these functions so filter/edge state
//! set on each [`ImageBuffer`] is honoured the same way a GPU sampler would.

use super::types::{FilterMode, ImageBuffer, Rgba};

/// Sample at a UV coordinate using the buffer's own filter mode.
#[inline]
pub fn sample(buf: &ImageBuffer, uv: [f32; 2]) -> Rgba {
    match buf.filter {
        FilterMode::Nearest => sample_nearest(buf, uv),
        FilterMode::Bilinear => sample_bilinear(buf, uv),
    }
}

#[inline]
pub fn sample_nearest(buf: &ImageBuffer, uv: [f32; 2]) -> Rgba {
    let x = (uv[0] * buf.width() as f32).floor() as i64;
    let y = (uv[1] * buf.height() as f32).floor() as i64;
    buf.load(x, y)
}

#[inline]
pub fn sample_bilinear(buf: &ImageBuffer, uv: [f32; 2]) -> Rgba {
    let (taps, weights) = bilinear_taps(buf.size(), uv);
    let mut out = [0.0; 4];
    for (t, w) in taps.iter().zip(weights.iter()) {
        let px = buf.load(t[0], t[1]);
        for c in 0..4 {
            out[c] += px[c] * w;
        }
    }
    out
}

/// The four texels and weights a bilinear lookup at `uv` touches.
#[inline]
pub fn bilinear_taps(size: [u32; 2], uv: [f32; 2]) -> ([[i64; 2]; 4], [f32; 4]) {
    let fx = uv[0] * size[0] as f32 - 0.5;
    let fy = uv[1] * size[1] as f32 - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;
    let x0 = x0 as i64;
    let y0 = y0 as i64;
    (
        [[x0, y0], [x0 + 1, y0], [x0, y0 + 1], [x0 + 1, y0 + 1]],
        [
            (1.0 - tx) * (1.0 - ty),
            tx * (1.0 - ty),
            (1.0 - tx) * ty,
            tx * ty,
        ],
    )
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_rgba(a: Rgba, b: Rgba, t: f32) -> Rgba {
    [
        lerp(a[0], b[0], t),
        lerp(a[1], b[1], t),
        lerp(a[2], b[2], t),
        lerp(a[3], b[3], t),
    ]
}

pub fn saturate(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = saturate((x - edge0) / (edge1 - edge0));
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::types::PixelFormat;

    #[test]
    fn bilinear_at_texel_center_returns_texel() {
        let mut buf = ImageBuffer::new([4, 4], PixelFormat::Rgba32Float);
        buf.set(2, 1, [1.0, 0.5, 0.25, 1.0]);
        let uv = buf.texel_uv(2, 1);
        assert_eq!(sample_bilinear(&buf, uv), [1.0, 0.5, 0.25, 1.0]);
    }

    #[test]
    fn point_filtered_buffers_do_not_blend() {
        let mut buf = ImageBuffer::new([2, 1], PixelFormat::Rgba32Float);
        buf.set(1, 0, [1.0, 1.0, 1.0, 1.0]);
        buf.filter = FilterMode::Nearest;
        assert_eq!(sample(&buf, [0.45, 0.5]), [0.0; 4]);
        assert_eq!(sample(&buf, [0.55, 0.5]), [1.0; 4]);
        buf.filter = FilterMode::Bilinear;
        assert!(sample(&buf, [0.45, 0.5])[0] > 0.0);
    }

    #[test]
    fn bilinear_midpoint_averages_neighbours() {
        let mut buf = ImageBuffer::new([2, 1], PixelFormat::Rgba32Float);
        buf.set(0, 0, [0.0, 0.0, 0.0, 1.0]);
        buf.set(1, 0, [1.0, 1.0, 1.0, 1.0]);
        let got = sample_bilinear(&buf, [0.5, 0.5]);
        assert!((got[0] - 0.5).abs() < 1e-6, "got {got:?}");
    }
}
