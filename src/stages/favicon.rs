//! Favicon generation.
//!
//! One square source image is resized into the icon families switched on in
//! `[favicon.icons]`. Renders run in parallel; nothing is written unless every
//! icon rendered.

use crate::build::{write_output, BuildContext, Stage, StageError, StageOutput};
use crate::config::FaviconConfig;
use image::codecs::ico::{IcoEncoder, IcoFrame};
use image::imageops::{self, FilterType};
use image::{ColorType, DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use lightningcss::traits::Parse;
use lightningcss::values::color::{CssColor, FloatColor};
use rayon::prelude::*;
use std::io::Cursor;
use std::path::PathBuf;

const ICO_SIZES: [u32; 5] = [16, 24, 32, 48, 64];

/// One PNG icon to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconSpec {
    /// Output file name
    pub name: String,
    /// Canvas width
    pub width: u32,
    /// Canvas height
    pub height: u32,
    /// Margin around the icon, in percent of the short side
    pub offset: u32,
    /// Whether the canvas is filled with the background color
    pub opaque: bool,
}

impl IconSpec {
    fn square(prefix: &str, size: u32, offset: u32, opaque: bool) -> Self {
        Self::rect(prefix, size, size, offset, opaque)
    }

    fn rect(prefix: &str, width: u32, height: u32, offset: u32, opaque: bool) -> Self {
        Self { name: format!("{}-{}x{}.png", prefix, width, height), width, height, offset, opaque }
    }
}

/// Every PNG icon the configuration asks for, in a stable order.
pub fn plan(config: &FaviconConfig) -> Vec<IconSpec> {
    let icons = &config.icons;
    let mut specs = Vec::new();

    if icons.android {
        for size in [36, 48, 72, 96, 144, 192, 256, 384, 512] {
            specs.push(IconSpec::square("android-chrome", size, 0, false));
        }
    }
    if icons.apple_icon {
        for size in [57, 60, 72, 76, 114, 120, 144, 152, 167, 180, 1024] {
            specs.push(IconSpec::square("apple-touch-icon", size, 0, true));
        }
        specs.push(IconSpec { name: "apple-touch-icon.png".to_string(), width: 180, height: 180, offset: 0, opaque: true });
    }
    if icons.apple_startup {
        for (w, h) in [(640, 1136), (750, 1334), (1125, 2436), (1242, 2208), (1536, 2048), (2048, 2732)] {
            specs.push(IconSpec::rect("apple-touch-startup-image", w, h, 35, true));
        }
    }
    if let Some(coast) = &icons.coast {
        specs.push(IconSpec::square("coast", 228, coast.offset, true));
    }
    if icons.favicons {
        for size in [16, 32, 48] {
            specs.push(IconSpec::square("favicon", size, 0, false));
        }
    }
    if icons.firefox {
        for size in [60, 128, 512] {
            specs.push(IconSpec::square("firefox_app", size, 0, false));
        }
    }
    if icons.windows {
        for (w, h) in [(70, 70), (144, 144), (150, 150), (310, 150), (310, 310)] {
            specs.push(IconSpec::rect("mstile", w, h, 0, false));
        }
    }
    if icons.yandex {
        specs.push(IconSpec::square("yandex-browser", 50, 0, false));
    }

    specs
}

/// Parse a CSS color for the icon background.
pub fn parse_background(value: &str) -> Result<Rgba<u8>, String> {
    let color = CssColor::parse_string(value).map_err(|e| format!("invalid background '{}': {}", value, e))?;
    match color.to_rgb().map_err(|_| format!("background '{}' has no RGB form", value))? {
        CssColor::RGBA(rgba) => Ok(Rgba([rgba.red, rgba.green, rgba.blue, rgba.alpha])),
        CssColor::Float(float) => match float.as_ref() {
            FloatColor::RGB(rgb) => Ok(Rgba([
                (rgb.r * 255.0).round() as u8,
                (rgb.g * 255.0).round() as u8,
                (rgb.b * 255.0).round() as u8,
                (rgb.alpha * 255.0).round() as u8,
            ])),
            _ => Err(format!("background '{}' has no RGB form", value)),
        },
        _ => Err(format!("background '{}' has no RGB form", value)),
    }
}

/// Draw the source centered on a `width`x`height` canvas.
pub fn render(source: &RgbaImage, spec: &IconSpec, background: Rgba<u8>) -> RgbaImage {
    let fill = if spec.opaque { background } else { Rgba([0, 0, 0, 0]) };
    let mut canvas = RgbaImage::from_pixel(spec.width, spec.height, fill);

    let short = spec.width.min(spec.height);
    let margin = short * spec.offset.min(49) / 100;
    let size = (short - 2 * margin).max(1);
    let icon = imageops::resize(source, size, size, FilterType::Lanczos3);

    let x = (spec.width - size) / 2;
    let y = (spec.height - size) / 2;
    imageops::overlay(&mut canvas, &icon, x as i64, y as i64);
    canvas
}

fn encode_png(img: RgbaImage) -> Result<Vec<u8>, String> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok(buf)
}

fn encode_ico(source: &RgbaImage) -> Result<Vec<u8>, String> {
    let frames = ICO_SIZES
        .iter()
        .map(|&size| {
            let frame = imageops::resize(source, size, size, FilterType::Lanczos3);
            IcoFrame::as_png(frame.as_raw(), size, size, ColorType::Rgba8).map_err(|e| e.to_string())
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut buf = Vec::new();
    IcoEncoder::new(&mut buf).encode_images(&frames).map_err(|e| e.to_string())?;
    Ok(buf)
}

fn android_manifest(name: &str, background: &str) -> String {
    let icons: Vec<_> = [36, 48, 72, 96, 144, 192, 256, 384, 512]
        .iter()
        .map(|size| {
            serde_json::json!({
                "src": format!("android-chrome-{0}x{0}.png", size),
                "sizes": format!("{0}x{0}", size),
                "type": "image/png",
            })
        })
        .collect();
    let manifest = serde_json::json!({
        "name": name,
        "short_name": name,
        "icons": icons,
        "background_color": background,
        "display": "standalone",
    });
    serde_json::to_string_pretty(&manifest).unwrap_or_default()
}

fn browserconfig(background: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<browserconfig>\n  <msapplication>\n    <tile>\n      \
         <square70x70logo src=\"mstile-70x70.png\"/>\n      <square150x150logo src=\"mstile-150x150.png\"/>\n      \
         <wide310x150logo src=\"mstile-310x150.png\"/>\n      <square310x310logo src=\"mstile-310x310.png\"/>\n      \
         <TileColor>{}</TileColor>\n    </tile>\n  </msapplication>\n</browserconfig>\n",
        background
    )
}

/// Generates favicons from `src/img/favicon.png`.
#[derive(Debug, Default)]
pub struct FaviconStage;

impl Stage for FaviconStage {
    fn name(&self) -> &str {
        "favicon"
    }

    fn description(&self) -> &str {
        "Generate favicons and platform icons"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageOutput, StageError> {
        let config = &ctx.config().favicon;
        let background = parse_background(&config.background).map_err(StageError::Config)?;
        let source_path = ctx.resolve_path(&config.source);
        let out_dir = ctx.resolve_path(&config.out);

        let mut output = StageOutput::new();
        if !source_path.is_file() {
            return Ok(output);
        }

        let source = match image::open(&source_path) {
            Ok(img) => img.to_rgba8(),
            Err(e) => {
                output.fail(&source_path, e.to_string());
                return Ok(output);
            }
        };

        let rendered: Result<Vec<(PathBuf, Vec<u8>)>, String> = plan(config)
            .par_iter()
            .map(|spec| encode_png(render(&source, spec, background)).map(|png| (out_dir.join(&spec.name), png)))
            .collect();
        let mut files = match rendered {
            Ok(files) => files,
            Err(message) => {
                output.fail(&source_path, message);
                return Ok(output);
            }
        };

        if config.icons.favicons {
            match encode_ico(&source) {
                Ok(ico) => files.push((out_dir.join("favicon.ico"), ico)),
                Err(message) => {
                    output.fail(&source_path, message);
                    return Ok(output);
                }
            }
        }
        if config.icons.android {
            let manifest = android_manifest(&ctx.config().project.name, &config.background);
            files.push((out_dir.join("manifest.json"), manifest.into_bytes()));
        }
        if config.icons.windows {
            files.push((out_dir.join("browserconfig.xml"), browserconfig(&config.background).into_bytes()));
        }

        for (path, bytes) in files {
            write_output(&path, bytes)?;
            output.wrote(path);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IconPlatforms, SiteConfig};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_source(root: &Path) {
        let img = RgbaImage::from_fn(128, 128, |x, _| if x < 64 { Rgba([255, 0, 0, 255]) } else { Rgba([0, 0, 255, 255]) });
        let path = root.join("src/img/favicon.png");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        img.save(path).unwrap();
    }

    fn names(config: &FaviconConfig) -> Vec<String> {
        plan(config).into_iter().map(|s| s.name).collect()
    }

    #[test]
    fn test_default_plan() {
        assert_eq!(
            names(&FaviconConfig::default()),
            vec!["coast-228x228.png", "favicon-16x16.png", "favicon-32x32.png", "favicon-48x48.png"]
        );
    }

    #[test]
    fn test_plan_follows_switches() {
        let mut config = FaviconConfig::default();
        config.icons = IconPlatforms { coast: None, favicons: false, yandex: true, ..IconPlatforms::default() };
        assert_eq!(names(&config), vec!["yandex-browser-50x50.png"]);
    }

    #[test]
    fn test_parse_background() {
        assert_eq!(parse_background("#fff").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_background("rgb(255 0 0)").unwrap(), Rgba([255, 0, 0, 255]));
        assert!(parse_background("not-a-color").is_err());
    }

    #[test]
    fn test_render_offset_leaves_background_margin() {
        let source = RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255]));
        let spec = IconSpec::square("coast", 228, 25, true);
        let icon = render(&source, &spec, Rgba([255, 255, 255, 255]));

        assert_eq!(icon.dimensions(), (228, 228));
        assert_eq!(*icon.get_pixel(5, 5), Rgba([255, 255, 255, 255]));
        assert_eq!(*icon.get_pixel(114, 114), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_render_transparent_canvas() {
        let source = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let spec = IconSpec::rect("mstile", 310, 150, 0, false);
        let icon = render(&source, &spec, Rgba([255, 255, 255, 255]));
        assert_eq!(icon.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_stage_writes_default_set() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path());
        let ctx = BuildContext::new(SiteConfig::with_name("t"), temp.path().to_path_buf());

        let output = FaviconStage.run(&ctx).unwrap();

        assert_eq!(output.written.len(), 5);
        let out = temp.path().join("img/favicons");
        let favicon = image::open(out.join("favicon-32x32.png")).unwrap();
        assert_eq!((favicon.width(), favicon.height()), (32, 32));
        assert!(out.join("coast-228x228.png").exists());
        let ico = fs::read(out.join("favicon.ico")).unwrap();
        assert_eq!(&ico[..4], &[0, 0, 1, 0]);
        assert_eq!(u16::from_le_bytes([ico[4], ico[5]]), 5);
    }

    #[test]
    fn test_stage_platform_manifests() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path());
        let mut config = SiteConfig::with_name("landing");
        config.favicon.icons.android = true;
        config.favicon.icons.windows = true;
        let ctx = BuildContext::new(config, temp.path().to_path_buf());

        FaviconStage.run(&ctx).unwrap();

        let manifest = fs::read_to_string(temp.path().join("img/favicons/manifest.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&manifest).unwrap();
        assert_eq!(json["name"], "landing");
        assert_eq!(json["icons"].as_array().unwrap().len(), 9);
        assert!(temp.path().join("img/favicons/browserconfig.xml").exists());
        assert!(temp.path().join("img/favicons/mstile-310x150.png").exists());
    }

    #[test]
    fn test_missing_source_is_silent() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(SiteConfig::with_name("t"), temp.path().to_path_buf());
        let output = FaviconStage.run(&ctx).unwrap();
        assert!(output.written.is_empty());
        assert!(output.failures.is_empty());
    }

    #[test]
    fn test_corrupt_source_is_recoverable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("src/img/favicon.png");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"not a png").unwrap();
        let ctx = BuildContext::new(SiteConfig::with_name("t"), temp.path().to_path_buf());

        let output = FaviconStage.run(&ctx).unwrap();

        assert_eq!(output.failures.len(), 1);
        assert!(!temp.path().join("img/favicons").exists());
    }
}
