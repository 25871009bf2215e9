//! Colour helpers shared by kernels, image I/O and config parsing.

use anyhow::{Result, anyhow, bail};

/// Rec.709 luma weights.
pub const LUMA_709: [f32; 3] = [0.2126, 0.7152, 0.0722];

pub fn luminance(rgb: [f32; 4]) -> f32 {
    rgb[0] * LUMA_709[0] + rgb[1] * LUMA_709[1] + rgb[2] * LUMA_709[2]
}

fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

pub fn linear_to_srgb_channel(x: f32) -> f32 {
    // https://en.wikipedia.org/wiki/SRGB
    let x = clamp01(x);
    if x <= 0.003_130_8 {
        12.92 * x
    } else {
        1.055 * x.powf(1.0 / 2.4) - 0.055
    }
}

pub fn srgb_to_linear_channel(x: f32) -> f32 {
    let x = clamp01(x);
    if x <= 0.040_45 {
        x / 12.92
    } else {
        ((x + 0.055) / 1.055).powf(2.4)
    }
}

/// Parse a colour param: `"#rrggbb"`, `"#rrggbbaa"`, or a 3/4 element number array.
pub fn parse_color(value: &serde_json::Value) -> Result<[f32; 4]> {
    if let Some(s) = value.as_str() {
        return parse_hex(s);
    }
    if let Some(arr) = value.as_array() {
        let comps: Vec<f32> = arr
            .iter()
            .map(|v| v.as_f64().map(|x| x as f32))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| anyhow!("colour array must contain only numbers: {value}"))?;
        return match comps.as_slice() {
            [r, g, b] => Ok([*r, *g, *b, 1.0]),
            [r, g, b, a] => Ok([*r, *g, *b, *a]),
            _ => bail!("colour array must have 3 or 4 components: {value}"),
        };
    }
    bail!("unsupported colour value: {value}")
}

fn parse_hex(s: &str) -> Result<[f32; 4]> {
    let hex = s.trim().trim_start_matches('#');
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        bail!("invalid hex colour '{s}'");
    }
    let byte = |i: usize| -> Result<f32> {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .map(|b| b as f32 / 255.0)
            .map_err(|e| anyhow!("invalid hex colour '{s}': {e}"))
    };
    let a = if hex.len() == 8 { byte(6)? } else { 1.0 };
    Ok([byte(0)?, byte(2)?, byte(4)?, a])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn srgb_round_trip_endpoints() {
        assert_eq!(srgb_to_linear_channel(0.0), 0.0);
        assert!((srgb_to_linear_channel(1.0) - 1.0).abs() < 1e-6);
        assert!((linear_to_srgb_channel(srgb_to_linear_channel(0.5)) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn parses_hex_and_arrays() {
        assert_eq!(parse_color(&json!("#ff0000")).unwrap(), [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(parse_color(&json!([0.5, 0.25, 1.0])).unwrap(), [0.5, 0.25, 1.0, 1.0]);
        assert!(parse_color(&json!("#12")).is_err());
        assert!(parse_color(&json!([1, 2])).is_err());
    }

    #[test]
    fn white_has_unit_luminance() {
        assert!((luminance([1.0, 1.0, 1.0, 1.0]) - 1.0).abs() < 1e-6);
    }
}
