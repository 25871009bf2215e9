use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::info;

use super::{
    frame::{FrameInputs, FrameRenderer, GBuffer},
    image_io::{Encoding, load_image, save_image},
};
use crate::dsl::{FrameDSL, effect_configs, frame_camera};

/// File inputs for one offline frame.
#[derive(Clone, Debug, Default)]
pub struct FrameFiles {
    pub input: PathBuf,
    pub depth: Option<PathBuf>,
    pub normals: Option<PathBuf>,
}

pub fn load_frame_inputs(files: &FrameFiles, frame: &FrameDSL) -> Result<FrameInputs> {
    let color = load_image(&files.input, Encoding::Srgb)?;
    let camera = frame_camera(frame, color.size());
    let mut inputs = FrameInputs::new(color).with_camera(camera);

    match (&files.depth, &files.normals) {
        (Some(depth), Some(normals)) => {
            let depth = load_image(depth, Encoding::Linear).context("loading depth buffer")?;
            let normals =
                load_image(normals, Encoding::Linear).context("loading normal buffer")?;
            if depth.size() != normals.size() {
                bail!(
                    "depth ({}x{}) and normal ({}x{}) buffers differ in size",
                    depth.width(),
                    depth.height(),
                    normals.width(),
                    normals.height()
                );
            }
            if depth.size() != inputs.color.size() {
                bail!(
                    "G-buffer ({}x{}) does not match the color image ({}x{})",
                    depth.width(),
                    depth.height(),
                    inputs.color.width(),
                    inputs.color.height()
                );
            }
            inputs = inputs.with_gbuffer(GBuffer { depth, normals });
        }
        (None, None) => {}
        _ => bail!("--depth and --normals must be given together"),
    }
    Ok(inputs)
}

/// Load, run every enabled effect of `frame`, and save to `output_path`.
pub fn render_frame_to_file(
    frame: &FrameDSL,
    files: &FrameFiles,
    output_path: impl AsRef<Path>,
) -> Result<()> {
    let inputs = load_frame_inputs(files, frame)?;
    let effects = effect_configs(frame)?;
    let renderer = FrameRenderer::new();
    let output = renderer.render_frame(&inputs, &effects);
    info!(
        effects = effects.len(),
        w = output.width(),
        h = output.height(),
        "frame rendered"
    );
    save_image(&output, output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse_frame_json;
    use crate::renderer::types::{ImageBuffer, PixelFormat};

    fn scratch_dir(tag: &str) -> PathBuf {
        let nonce = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("post-fx-headless-{tag}-{nonce}"));
        std::fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    fn write_png(dir: &Path, name: &str, size: [u32; 2]) -> PathBuf {
        let path = dir.join(name);
        let img = ImageBuffer::filled(size, PixelFormat::Rgba8Unorm, [0.5, 0.5, 0.5, 1.0]);
        save_image(&img, &path).expect("save png");
        path
    }

    fn empty_frame() -> FrameDSL {
        parse_frame_json(r#"{ "version": "1.0", "metadata": { "name": "t" } }"#)
            .expect("parse frame")
    }

    #[test]
    fn gbuffer_must_match_the_color_image() {
        let dir = scratch_dir("size");
        let files = FrameFiles {
            input: write_png(&dir, "color.png", [16, 16]),
            depth: Some(write_png(&dir, "depth.png", [8, 8])),
            normals: Some(write_png(&dir, "normals.png", [8, 8])),
        };
        let err = load_frame_inputs(&files, &empty_frame()).unwrap_err();
        assert!(err.to_string().contains("does not match the color image"), "{err}");

        let files = FrameFiles {
            depth: Some(write_png(&dir, "depth16.png", [16, 16])),
            normals: Some(write_png(&dir, "normals16.png", [16, 16])),
            ..files
        };
        let inputs = load_frame_inputs(&files, &empty_frame()).expect("matching sizes load");
        assert!(inputs.gbuffer.is_some());
        let _ = std::fs::remove_dir_all(dir);
    }
}
