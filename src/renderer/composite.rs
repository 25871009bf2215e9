//! Composite weight functions.
//!
//! Every function here is pure, clamped to `[0, 1]`, and monotonic in one
//! documented direction so reflection and bloom composites never overshoot.

use crate::renderer::sampler::saturate;

/// Fade towards the screen border. Rises from 0 at the edge to 1 once `uv`
/// is at least `fade` (fraction of the half-screen) away from every edge.
/// `fade <= 0` disables fading inside the screen; outside it is always 0.
pub fn screen_edge_fade(uv: [f32; 2], fade: f32) -> f32 {
    let edge = uv[0].min(1.0 - uv[0]).min(uv[1]).min(1.0 - uv[1]);
    if !(edge >= 0.0) {
        return 0.0;
    }
    if fade <= 0.0 {
        return 1.0;
    }
    saturate(edge * 2.0 / fade.min(1.0))
}

/// Fade over the last `fade_distance` world units before `max_distance`.
/// Decreases with distance; 0 at or beyond `max_distance`.
pub fn distance_fade(distance: f32, max_distance: f32, fade_distance: f32) -> f32 {
    if max_distance <= 0.0 || !(distance < max_distance) {
        return 0.0;
    }
    let fade = fade_distance.max(0.0);
    if fade <= 0.0 {
        return 1.0;
    }
    saturate((max_distance - distance.max(0.0)) / fade)
}

/// View-angle weight. `n_dot_v` is the cosine between surface normal and the
/// direction to the eye; the weight grows as it falls towards grazing (0).
/// `fade = 0` turns the term off (constant 1).
pub fn fresnel_fade(n_dot_v: f32, fade: f32, power: f32) -> f32 {
    let fresnel = (1.0 - saturate(n_dot_v)).powf(power.max(0.0));
    let fade = saturate(fade);
    saturate(1.0 - fade + fade * fresnel)
}

/// Smoothness cut-off: 0 at `min_smoothness - falloff_range`, 1 at
/// `min_smoothness` and above. A zero range gives a hard step.
pub fn roughness_falloff(smoothness: f32, min_smoothness: f32, falloff_range: f32) -> f32 {
    if falloff_range <= 0.0 {
        return if smoothness >= min_smoothness { 1.0 } else { 0.0 };
    }
    saturate((smoothness - (min_smoothness - falloff_range)) / falloff_range)
}

/// Per-level bloom shape weights. Levels 0 and 1 carry the blur amount
/// (`0..=5`), coarser levels the spread amount (percent), tapering with depth.
pub fn bloom_level_weights(levels: usize, blur_amount: f32, spread_percent: f32) -> Vec<f32> {
    let blur = saturate(blur_amount / 5.0);
    let spread = saturate(spread_percent / 100.0);
    (0..levels)
        .map(|i| if i < 2 { blur } else { spread / (i - 1) as f32 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn edge_fade_is_zero_outside_and_one_at_centre() {
        assert_eq!(screen_edge_fade([-0.1, 0.5], 0.5), 0.0);
        assert_eq!(screen_edge_fade([0.5, 0.5], 0.5), 1.0);
        assert_eq!(screen_edge_fade([0.0, 0.5], 0.5), 0.0);
        assert_eq!(screen_edge_fade([0.01, 0.5], 0.0), 1.0);
    }

    #[test]
    fn bloom_weights_split_blur_and_spread() {
        assert_eq!(bloom_level_weights(5, 0.0, 0.0), vec![0.0; 5]);
        let w = bloom_level_weights(5, 5.0, 100.0);
        assert_eq!(w[0], 1.0);
        assert_eq!(w[2], 1.0);
        assert_eq!(w[4], 1.0 / 3.0);
    }

    proptest! {
        #[test]
        fn fresnel_grows_towards_grazing(a in 0.0f32..1.0, b in 0.0f32..1.0, fade in 0.0f32..1.0, power in 0.0f32..10.0) {
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            let w_grazing = fresnel_fade(lo, fade, power);
            let w_facing = fresnel_fade(hi, fade, power);
            prop_assert!(w_grazing + 1e-6 >= w_facing);
            prop_assert!((0.0..=1.0).contains(&w_grazing));
        }

        #[test]
        fn distance_fade_decreases(a in 0.0f32..200.0, b in 0.0f32..200.0, max in 0.0f32..150.0, fade in 0.0f32..300.0) {
            let (near, far) = if a < b { (a, b) } else { (b, a) };
            let wn = distance_fade(near, max, fade);
            let wf = distance_fade(far, max, fade);
            prop_assert!(wn + 1e-6 >= wf);
            prop_assert!((0.0..=1.0).contains(&wn) && (0.0..=1.0).contains(&wf));
        }

        #[test]
        fn edge_fade_grows_towards_centre(t in 0.0f32..0.5, dt in 0.0f32..0.5, fade in 0.0f32..1.0) {
            let inner = (t + dt).min(0.5);
            let w_edge = screen_edge_fade([t, 0.5], fade);
            let w_inner = screen_edge_fade([inner, 0.5], fade);
            prop_assert!(w_inner + 1e-6 >= w_edge);
            prop_assert!((0.0..=1.0).contains(&w_edge));
        }

        #[test]
        fn roughness_falloff_grows_with_smoothness(a in 0.0f32..1.0, b in 0.0f32..1.0, min in 0.0f32..1.0, range in 0.0f32..1.0) {
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            let wl = roughness_falloff(lo, min, range);
            let wh = roughness_falloff(hi, min, range);
            prop_assert!(wh + 1e-6 >= wl);
            prop_assert!((0.0..=1.0).contains(&wh));
        }
    }
}
