//! Image file I/O.
//!
//! Everything loads into `Rgba32Float`. Integer-encoded colour files (PNG,
//! JPEG) are sRGB and get linearised on load and re-encoded on save; data
//! images such as depth and normals are read as-is with [`Encoding::Linear`].

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use image::{ColorType, DynamicImage, ImageFormat, Rgba32FImage, RgbaImage};

use super::types::{ImageBuffer, PixelFormat, Rgba};
use crate::color::{linear_to_srgb_channel, srgb_to_linear_channel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    /// Integer files hold sRGB colour.
    Srgb,
    /// Values are stored linearly (G-buffer data, or any float file).
    Linear,
}

fn is_float(color: ColorType) -> bool {
    matches!(color, ColorType::Rgb32F | ColorType::Rgba32F)
}

pub fn image_from_dynamic(img: &DynamicImage, encoding: Encoding) -> Result<ImageBuffer> {
    let linearise = encoding == Encoding::Srgb && !is_float(img.color());
    let rgba = img.to_rgba32f();
    let (w, h) = rgba.dimensions();
    let texels: &[Rgba] = bytemuck::cast_slice(rgba.as_raw());
    let pixels = texels
        .iter()
        .map(|px| {
            if linearise {
                [
                    srgb_to_linear_channel(px[0]),
                    srgb_to_linear_channel(px[1]),
                    srgb_to_linear_channel(px[2]),
                    px[3],
                ]
            } else {
                *px
            }
        })
        .collect();
    ImageBuffer::from_pixels([w, h], PixelFormat::Rgba32Float, pixels)
        .ok_or_else(|| anyhow!("decoded image has inconsistent size {w}x{h}"))
}

pub fn load_image(path: impl AsRef<Path>, encoding: Encoding) -> Result<ImageBuffer> {
    let path = path.as_ref();
    let img = image::open(path).with_context(|| format!("failed to open image {}", path.display()))?;
    image_from_dynamic(&img, encoding)
}

/// 8-bit sRGB copy of `img`, clamped to `[0, 1]`.
pub fn to_rgba8_srgb(img: &ImageBuffer) -> Result<RgbaImage> {
    let bytes: Vec<u8> = img
        .pixels()
        .iter()
        .flat_map(|px| {
            let rgb = [0, 1, 2].map(|c| linear_to_srgb_channel(px[c].clamp(0.0, 1.0)));
            [rgb[0], rgb[1], rgb[2], px[3].clamp(0.0, 1.0)]
        })
        .map(|c| if c.is_nan() { 0 } else { (c * 255.0).round() as u8 })
        .collect();
    RgbaImage::from_raw(img.width(), img.height(), bytes)
        .ok_or_else(|| anyhow!("pixel buffer does not match {}x{}", img.width(), img.height()))
}

pub fn to_rgba32f(img: &ImageBuffer) -> Result<Rgba32FImage> {
    let floats: &[f32] = bytemuck::cast_slice(img.pixels());
    Rgba32FImage::from_raw(img.width(), img.height(), floats.to_vec())
        .ok_or_else(|| anyhow!("pixel buffer does not match {}x{}", img.width(), img.height()))
}

/// Save by extension: `.exr` keeps linear float data, `.png`/`.jpg` are
/// 8-bit sRGB.
pub fn save_image(img: &ImageBuffer, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let format = ImageFormat::from_path(path)
        .with_context(|| format!("cannot infer image format from {}", path.display()))?;
    let dynamic = match format {
        ImageFormat::OpenExr => DynamicImage::ImageRgba32F(to_rgba32f(img)?),
        ImageFormat::Png => DynamicImage::ImageRgba8(to_rgba8_srgb(img)?),
        // JPEG has no alpha channel.
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(to_rgba8_srgb(img)?).to_rgb8()),
        other => bail!("unsupported output format {other:?} for {}", path.display()),
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    dynamic
        .save_with_format(path, format)
        .with_context(|| format!("failed to save {}", path.display()))
}
