//! Image optimization stage.
//!
//! JPEGs are re-encoded at the configured quality, PNGs re-encoded losslessly
//! (keeping the original when that is not smaller), everything else is copied
//! as is. Files run in parallel.

use crate::build::{write_output, BuildContext, Stage, StageError, StageOutput};
use crate::config::ImagesConfig;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageEncoder, ImageFormat};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Whether `dest` exists and is at least as new as `src`.
pub fn is_up_to_date(src: &Path, dest: &Path) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(src), modified(dest)) {
        (Some(src_time), Some(dest_time)) => dest_time >= src_time,
        _ => false,
    }
}

/// Optimize image bytes according to the file extension.
///
/// Unknown extensions are returned unchanged.
pub fn optimize(bytes: &[u8], extension: &str, config: &ImagesConfig) -> Result<Vec<u8>, String> {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => encode_jpeg(bytes, config.jpeg_quality),
        "png" => {
            let encoded = encode_png(bytes, config.png_level)?;
            Ok(if encoded.len() < bytes.len() { encoded } else { bytes.to_vec() })
        }
        _ => Ok(bytes.to_vec()),
    }
}

fn encode_jpeg(bytes: &[u8], quality: u8) -> Result<Vec<u8>, String> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg).map_err(|e| e.to_string())?;
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)
        .map_err(|e| e.to_string())?;
    Ok(out)
}

fn encode_png(bytes: &[u8], level: u8) -> Result<Vec<u8>, String> {
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png).map_err(|e| e.to_string())?;
    let compression = match level {
        0 | 1 => CompressionType::Fast,
        2..=4 => CompressionType::Default,
        _ => CompressionType::Best,
    };
    let mut out = Vec::new();
    PngEncoder::new_with_quality(&mut out, compression, FilterType::Adaptive)
        .write_image(img.as_bytes(), img.width(), img.height(), img.color())
        .map_err(|e| e.to_string())?;
    Ok(out)
}

enum Outcome {
    Written(PathBuf),
    UpToDate(PathBuf),
    Failed(PathBuf, String),
}

/// Optimizes images into `img/`, skipping files whose output is newer.
#[derive(Debug, Default)]
pub struct ImagesStage;

impl Stage for ImagesStage {
    fn name(&self) -> &str {
        "img"
    }

    fn description(&self) -> &str {
        "Optimize images (skips files already up to date)"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageOutput, StageError> {
        let config = &ctx.config().images;
        let out_dir = ctx.resolve_path(&config.out);
        let files = config.sources.resolve(ctx.project_root())?;
        let force = ctx.is_forced();

        let outcomes: Vec<Result<Outcome, StageError>> = files
            .par_iter()
            .map(|file| {
                let dest = out_dir.join(&file.relative);
                if !force && is_up_to_date(&file.path, &dest) {
                    return Ok(Outcome::UpToDate(dest));
                }

                let bytes = fs::read(&file.path).map_err(|e| StageError::io(&file.path, e))?;
                let ext = file.path.extension().map(|e| e.to_string_lossy().into_owned()).unwrap_or_default();
                match optimize(&bytes, &ext, config) {
                    Ok(optimized) => {
                        write_output(&dest, optimized)?;
                        Ok(Outcome::Written(dest))
                    }
                    Err(message) => Ok(Outcome::Failed(file.path.clone(), message)),
                }
            })
            .collect();

        let mut output = StageOutput::new();
        for outcome in outcomes {
            match outcome? {
                Outcome::Written(path) => output.wrote(path),
                Outcome::UpToDate(path) => output.skipped(path),
                Outcome::Failed(path, message) => output.fail(path, message),
            }
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_fn(64, 64, |x, y| Rgba([(x * 4) as u8, (y * 4) as u8, 128, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
            .unwrap();
        buf
    }

    fn jpeg_bytes() -> Vec<u8> {
        let img = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 64]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Jpeg(100))
            .unwrap();
        buf
    }

    fn setup(files: &[(&str, Vec<u8>)]) -> (TempDir, BuildContext) {
        let temp = TempDir::new().unwrap();
        for (rel, bytes) in files {
            let path = temp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, bytes).unwrap();
        }
        let ctx = BuildContext::new(SiteConfig::with_name("t"), temp.path().to_path_buf());
        (temp, ctx)
    }

    #[test]
    fn test_optimize_jpeg_smaller_and_valid() {
        let original = jpeg_bytes();
        let optimized = optimize(&original, "jpg", &ImagesConfig::default()).unwrap();
        assert!(optimized.len() < original.len());
        assert!(image::load_from_memory(&optimized).is_ok());
    }

    #[test]
    fn test_optimize_png_never_grows() {
        let original = png_bytes();
        let optimized = optimize(&original, "PNG", &ImagesConfig::default()).unwrap();
        assert!(optimized.len() <= original.len());
        let decoded = image::load_from_memory(&optimized).unwrap();
        assert_eq!(decoded.to_rgba8(), image::load_from_memory(&original).unwrap().to_rgba8());
    }

    #[test]
    fn test_optimize_passthrough() {
        let svg = b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>".to_vec();
        assert_eq!(optimize(&svg, "svg", &ImagesConfig::default()).unwrap(), svg);
    }

    #[test]
    fn test_optimize_corrupt_jpeg() {
        assert!(optimize(b"not a jpeg", "jpg", &ImagesConfig::default()).is_err());
    }

    #[test]
    fn test_stage_mirrors_layout_and_excludes() {
        let (temp, ctx) = setup(&[
            ("src/img/logo.png", png_bytes()),
            ("src/img/photos/cat.jpg", jpeg_bytes()),
            ("src/img/favicon.png", png_bytes()),
            ("src/img/sprite/icon.svg", b"<svg/>".to_vec()),
        ]);

        let output = ImagesStage.run(&ctx).unwrap();

        assert_eq!(output.written.len(), 2);
        assert!(temp.path().join("img/logo.png").exists());
        assert!(temp.path().join("img/photos/cat.jpg").exists());
        assert!(!temp.path().join("img/favicon.png").exists());
        assert!(!temp.path().join("img/sprite/icon.svg").exists());
    }

    #[test]
    fn test_stage_skips_up_to_date() {
        let (temp, ctx) = setup(&[("src/img/logo.png", png_bytes())]);
        ImagesStage.run(&ctx).unwrap();

        let second = ImagesStage.run(&ctx).unwrap();
        assert!(second.written.is_empty());
        assert_eq!(second.up_to_date, vec![temp.path().join("img/logo.png")]);

        let forced = ImagesStage.run(&ctx.clone().with_force(true)).unwrap();
        assert_eq!(forced.written.len(), 1);
    }

    #[test]
    fn test_stage_reprocesses_newer_source() {
        let (temp, ctx) = setup(&[("src/img/logo.png", png_bytes())]);
        ImagesStage.run(&ctx).unwrap();

        let src = temp.path().join("src/img/logo.png");
        let later = SystemTime::now() + Duration::from_secs(10);
        fs::File::options().write(true).open(&src).unwrap().set_modified(later).unwrap();

        let output = ImagesStage.run(&ctx).unwrap();
        assert_eq!(output.written.len(), 1);
    }

    #[test]
    fn test_stage_corrupt_file_is_recoverable() {
        let (temp, ctx) = setup(&[("src/img/bad.jpg", b"garbage".to_vec()), ("src/img/ok.png", png_bytes())]);

        let output = ImagesStage.run(&ctx).unwrap();

        assert_eq!(output.failures.len(), 1);
        assert!(temp.path().join("img/ok.png").exists());
        assert!(!temp.path().join("img/bad.jpg").exists());
    }
}
