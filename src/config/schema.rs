//! Configuration schema types for `webpipe.toml`
//!
//! Every section is optional. The defaults reproduce the classic front-end
//! layout: sources under `src/`, compiled output at the project root.

use crate::fileset::FileSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// How a stage emits source maps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMapMode {
    /// Embed the map as a base64 data URL comment
    Inline,
    /// Write `<output>.map` next to the output
    File,
    /// No source map
    None,
}

/// What a watch binding pushes to connected browsers after a rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReloadMode {
    /// Inject CSS and images in place, reload the page for anything else
    #[default]
    Auto,
    /// Always reload the whole page
    Full,
}

/// Project metadata section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,
    /// Source root; never touched by `clean`
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Installed package root used by `deps` and Sass load paths
    #[serde(default = "default_modules")]
    pub modules: PathBuf,
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_modules() -> PathBuf {
    PathBuf::from("node_modules")
}

fn default_true() -> bool {
    true
}

/// Sass compilation and CSS post-processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SassConfig {
    /// Stylesheet sources; `_partial` files are never emitted
    #[serde(default = "default_sass_sources")]
    pub sources: FileSet,
    /// Output directory for compiled CSS
    #[serde(default = "default_root_out")]
    pub out: PathBuf,
    /// Extra Sass load paths (relative to the project root)
    #[serde(default = "default_include_paths")]
    pub include_paths: Vec<PathBuf>,
    /// Browserslist queries used for vendor prefixing
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,
    /// Merge identical media queries and move them to the end
    #[serde(default = "default_true")]
    pub pack_media_queries: bool,
    /// Minify the compiled CSS
    #[serde(default = "default_true")]
    pub minify: bool,
    /// Source map emission
    #[serde(default = "default_inline")]
    pub source_map: SourceMapMode,
}

impl Default for SassConfig {
    fn default() -> Self {
        Self {
            sources: default_sass_sources(),
            out: default_root_out(),
            include_paths: default_include_paths(),
            browsers: default_browsers(),
            pack_media_queries: true,
            minify: true,
            source_map: SourceMapMode::Inline,
        }
    }
}

fn default_sass_sources() -> FileSet {
    FileSet::new(["src/sass/**/*.sass", "src/sass/**/*.scss"])
}

fn default_root_out() -> PathBuf {
    PathBuf::from(".")
}

fn default_include_paths() -> Vec<PathBuf> {
    vec![default_modules()]
}

fn default_browsers() -> Vec<String> {
    vec!["defaults".to_string()]
}

fn default_inline() -> SourceMapMode {
    SourceMapMode::Inline
}

/// HTML include processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlConfig {
    /// Page sources (partials live outside this set)
    #[serde(default = "default_html_sources")]
    pub sources: FileSet,
    /// Output directory for flattened pages
    #[serde(default = "default_root_out")]
    pub out: PathBuf,
    /// Directive prefix, so `@` gives `@include('file')`
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for HtmlConfig {
    fn default() -> Self {
        Self { sources: default_html_sources(), out: default_root_out(), prefix: default_prefix() }
    }
}

fn default_html_sources() -> FileSet {
    FileSet::new(["src/html/*.html"])
}

fn default_prefix() -> String {
    "@".to_string()
}

/// First-party script bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Script sources, concatenated in resolution order
    #[serde(default = "default_script_sources")]
    pub sources: FileSet,
    /// Bundle output file
    #[serde(default = "default_script_output")]
    pub output: PathBuf,
    /// Minify the bundle
    #[serde(default)]
    pub minify: bool,
    /// Source map emission
    #[serde(default = "default_file_map")]
    pub source_map: SourceMapMode,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            sources: default_script_sources(),
            output: default_script_output(),
            minify: false,
            source_map: SourceMapMode::File,
        }
    }
}

fn default_script_sources() -> FileSet {
    FileSet::new(["src/js/inc/**/*.js", "src/js/main.js"])
}

fn default_script_output() -> PathBuf {
    PathBuf::from("js/main.js")
}

fn default_file_map() -> SourceMapMode {
    SourceMapMode::File
}

/// Third-party plugin bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepsConfig {
    /// Plugin scripts in load order (relative to the project root)
    #[serde(default = "default_plugins")]
    pub plugins: Vec<PathBuf>,
    /// Bundle output file
    #[serde(default = "default_deps_output")]
    pub output: PathBuf,
    /// Minify the bundle
    #[serde(default = "default_true")]
    pub minify: bool,
}

impl Default for DepsConfig {
    fn default() -> Self {
        Self { plugins: default_plugins(), output: default_deps_output(), minify: true }
    }
}

fn default_plugins() -> Vec<PathBuf> {
    [
        "node_modules/jquery/dist/jquery.js",
        "node_modules/svg4everybody/dist/svg4everybody.js",
        "node_modules/jquery-nice-select/js/jquery.nice-select.js",
        "node_modules/magnific-popup/dist/jquery.magnific-popup.js",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

fn default_deps_output() -> PathBuf {
    PathBuf::from("js/deps.js")
}

/// Image optimization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Image sources
    #[serde(default = "default_image_sources")]
    pub sources: FileSet,
    /// Output directory
    #[serde(default = "default_img_out")]
    pub out: PathBuf,
    /// JPEG re-encode quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// PNG optimization level (0-7)
    #[serde(default = "default_png_level")]
    pub png_level: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            sources: default_image_sources(),
            out: default_img_out(),
            jpeg_quality: default_jpeg_quality(),
            png_level: default_png_level(),
        }
    }
}

fn default_image_sources() -> FileSet {
    FileSet::new([
        "src/img/**/*.png",
        "src/img/**/*.jpg",
        "src/img/**/*.jpeg",
        "src/img/**/*.gif",
        "src/img/**/*.svg",
    ])
    .excluding(["src/img/favicon.png", "src/img/sprite/**"])
}

fn default_img_out() -> PathBuf {
    PathBuf::from("img")
}

fn default_jpeg_quality() -> u8 {
    70
}

fn default_png_level() -> u8 {
    2
}

/// Passthrough copy (fonts, video)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyConfig {
    /// Files to copy
    pub sources: FileSet,
    /// Destination directory
    pub out: PathBuf,
}

fn default_video() -> CopyConfig {
    CopyConfig { sources: FileSet::new(["src/img/**/*.mp4"]), out: default_img_out() }
}

fn default_fonts() -> CopyConfig {
    CopyConfig {
        sources: FileSet::new([
            "src/fonts/**/*.eot",
            "src/fonts/**/*.ttf",
            "src/fonts/**/*.woff",
            "src/fonts/**/*.woff2",
        ]),
        out: PathBuf::from("fonts"),
    }
}

/// Coast icon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoastConfig {
    /// Padding on each side, in percent of the icon size
    #[serde(default = "default_coast_offset")]
    pub offset: u32,
}

fn default_coast_offset() -> u32 {
    25
}

/// Which icon families the favicon stage renders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconPlatforms {
    #[serde(default)]
    pub android: bool,
    #[serde(default)]
    pub apple_icon: bool,
    #[serde(default)]
    pub apple_startup: bool,
    /// Coast icon; absent disables it
    #[serde(default = "default_coast")]
    pub coast: Option<CoastConfig>,
    #[serde(default = "default_true")]
    pub favicons: bool,
    #[serde(default)]
    pub firefox: bool,
    #[serde(default)]
    pub windows: bool,
    #[serde(default)]
    pub yandex: bool,
}

impl Default for IconPlatforms {
    fn default() -> Self {
        Self {
            android: false,
            apple_icon: false,
            apple_startup: false,
            coast: default_coast(),
            favicons: true,
            firefox: false,
            windows: false,
            yandex: false,
        }
    }
}

fn default_coast() -> Option<CoastConfig> {
    Some(CoastConfig { offset: default_coast_offset() })
}

/// Favicon generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaviconConfig {
    /// Master icon image
    #[serde(default = "default_favicon_source")]
    pub source: PathBuf,
    /// Output directory
    #[serde(default = "default_favicon_out")]
    pub out: PathBuf,
    /// Background for padded icons (any CSS color)
    #[serde(default = "default_background")]
    pub background: String,
    /// Enabled icon families
    #[serde(default)]
    pub icons: IconPlatforms,
}

impl Default for FaviconConfig {
    fn default() -> Self {
        Self {
            source: default_favicon_source(),
            out: default_favicon_out(),
            background: default_background(),
            icons: IconPlatforms::default(),
        }
    }
}

fn default_favicon_source() -> PathBuf {
    PathBuf::from("src/img/favicon.png")
}

fn default_favicon_out() -> PathBuf {
    PathBuf::from("img/favicons")
}

fn default_background() -> String {
    "#fff".to_string()
}

/// SVG sprite assembly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteConfig {
    /// Icon sources
    #[serde(default = "default_sprite_sources")]
    pub sources: FileSet,
    /// Sprite output file
    #[serde(default = "default_sprite_output")]
    pub output: PathBuf,
    /// Attributes removed from every element so symbols can be restyled
    #[serde(default = "default_strip_attributes")]
    pub strip_attributes: Vec<String>,
}

impl Default for SpriteConfig {
    fn default() -> Self {
        Self {
            sources: default_sprite_sources(),
            output: default_sprite_output(),
            strip_attributes: default_strip_attributes(),
        }
    }
}

fn default_sprite_sources() -> FileSet {
    FileSet::new(["src/img/sprite/**/*.svg"])
}

fn default_sprite_output() -> PathBuf {
    PathBuf::from("img/sprite.svg")
}

fn default_strip_attributes() -> Vec<String> {
    vec!["fill".to_string()]
}

/// Unused CSS removal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeConfig {
    /// Stylesheet rewritten in place
    #[serde(default = "default_purge_stylesheet")]
    pub stylesheet: PathBuf,
    /// Files scanned for used class names and ids
    #[serde(default = "default_purge_content")]
    pub content: FileSet,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self { stylesheet: default_purge_stylesheet(), content: default_purge_content() }
    }
}

fn default_purge_stylesheet() -> PathBuf {
    PathBuf::from("style.css")
}

fn default_purge_content() -> FileSet {
    FileSet::new(["*.html", "js/*.js"])
}

/// Generated output removal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanConfig {
    /// Globs (relative to the root) deleted by `clean`
    #[serde(default = "default_clean_paths")]
    pub paths: Vec<String>,
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self { paths: default_clean_paths() }
    }
}

fn default_clean_paths() -> Vec<String> {
    ["*.html", "img", "css", "js", "fonts"].into_iter().map(String::from).collect()
}

/// Development server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServeConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port (0 picks a free port)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Show an on-page badge when assets are injected or reloaded
    #[serde(default)]
    pub notify: bool,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), notify: false }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// One watched source category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchBinding {
    /// Label used in log lines
    pub name: String,
    /// Files whose changes trigger the binding
    pub files: FileSet,
    /// Tasks re-run on change
    pub tasks: Vec<String>,
    /// What connected browsers receive afterwards
    #[serde(default)]
    pub reload: ReloadMode,
}

impl WatchBinding {
    fn new(name: &str, files: FileSet, task: &str, reload: ReloadMode) -> Self {
        Self { name: name.to_string(), files, tasks: vec![task.to_string()], reload }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default)]
    pub clear_screen: bool,
    /// Source categories and the tasks they trigger
    #[serde(default = "default_bindings")]
    pub bindings: Vec<WatchBinding>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms(), clear_screen: false, bindings: default_bindings() }
    }
}

fn default_debounce_ms() -> u32 {
    100
}

fn default_bindings() -> Vec<WatchBinding> {
    vec![
        WatchBinding::new("styles", default_sass_sources(), "sass", ReloadMode::Auto),
        WatchBinding::new("scripts", FileSet::new(["src/js/**/*.js"]), "scripts", ReloadMode::Auto),
        WatchBinding::new("html", FileSet::new(["src/html/**/*.html"]), "html", ReloadMode::Full),
        WatchBinding::new("sprite", default_sprite_sources(), "svg", ReloadMode::Auto),
        WatchBinding::new(
            "images",
            FileSet::new([
                "src/img/**/*.png",
                "src/img/**/*.jpg",
                "src/img/**/*.jpeg",
                "src/img/**/*.gif",
                "src/img/**/*.svg",
            ])
            .excluding(["src/img/sprite/**"]),
            "img",
            ReloadMode::Auto,
        ),
    ]
}

/// Complete webpipe.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Project metadata
    pub project: ProjectConfig,
    #[serde(default)]
    pub sass: SassConfig,
    #[serde(default)]
    pub html: HtmlConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
    #[serde(default)]
    pub deps: DepsConfig,
    #[serde(default)]
    pub images: ImagesConfig,
    #[serde(default = "default_video")]
    pub video: CopyConfig,
    #[serde(default = "default_fonts")]
    pub fonts: CopyConfig,
    #[serde(default)]
    pub favicon: FaviconConfig,
    #[serde(default)]
    pub sprite: SpriteConfig,
    #[serde(default)]
    pub purge: PurgeConfig,
    #[serde(default)]
    pub clean: CleanConfig,
    #[serde(default)]
    pub serve: ServeConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    /// Extra aggregate tasks: name -> dependencies
    #[serde(default)]
    pub aggregates: BTreeMap<String, Vec<String>>,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "images.jpeg_quality")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "webpipe.toml: '{}' {}", self.field, self.message)
    }
}

impl SiteConfig {
    /// Configuration with every section at its default.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            project: ProjectConfig { name: name.into(), src: default_src(), modules: default_modules() },
            sass: SassConfig::default(),
            html: HtmlConfig::default(),
            scripts: ScriptsConfig::default(),
            deps: DepsConfig::default(),
            images: ImagesConfig::default(),
            video: default_video(),
            fonts: default_fonts(),
            favicon: FaviconConfig::default(),
            sprite: SpriteConfig::default(),
            purge: PurgeConfig::default(),
            clean: CleanConfig::default(),
            serve: ServeConfig::default(),
            watch: WatchConfig::default(),
            aggregates: BTreeMap::new(),
        }
    }

    /// Validate the configuration and return any errors
    ///
    /// Task names referenced by watch bindings and aggregates are checked
    /// later, when the task graph is built.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: String, message: String| {
            errors.push(ConfigValidationError { field, message });
        };

        if self.project.name.is_empty() {
            push("project.name".to_string(), "must be a non-empty string".to_string());
        }

        let file_sets = [
            ("sass.sources", &self.sass.sources),
            ("html.sources", &self.html.sources),
            ("scripts.sources", &self.scripts.sources),
            ("images.sources", &self.images.sources),
            ("video.sources", &self.video.sources),
            ("fonts.sources", &self.fonts.sources),
            ("sprite.sources", &self.sprite.sources),
            ("purge.content", &self.purge.content),
        ];
        for (field, set) in file_sets {
            if let Err(e) = set.validate() {
                push(field.to_string(), e.to_string());
            }
        }

        if self.html.prefix.is_empty() {
            push("html.prefix".to_string(), "must be a non-empty string".to_string());
        }

        if !(1..=100).contains(&self.images.jpeg_quality) {
            push("images.jpeg_quality".to_string(), "must be between 1 and 100".to_string());
        }
        if self.images.png_level > 7 {
            push("images.png_level".to_string(), "must be between 0 and 7".to_string());
        }

        if let Some(coast) = &self.favicon.icons.coast {
            if coast.offset >= 50 {
                push("favicon.icons.coast.offset".to_string(), "must be below 50".to_string());
            }
        }

        for pattern in &self.clean.paths {
            if let Err(e) = glob::Pattern::new(pattern) {
                push("clean.paths".to_string(), format!("invalid glob '{}': {}", pattern, e));
            } else if Path::new(pattern).is_absolute() || pattern.split(['/', '\\']).any(|part| part == "..") {
                push("clean.paths".to_string(), format!("'{}' must stay inside the project", pattern));
            }
        }

        for (i, binding) in self.watch.bindings.iter().enumerate() {
            if let Err(e) = binding.files.validate() {
                push(format!("watch.bindings[{}].files", i), e.to_string());
            }
            if binding.tasks.is_empty() {
                push(format!("watch.bindings[{}].tasks", i), "must name at least one task".to_string());
            }
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}
