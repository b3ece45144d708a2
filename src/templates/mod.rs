//! Starter files written by `webpipe init`.
//!
//! ```ignore
//! use webpipe::templates::generate_config;
//!
//! std::fs::write("webpipe.toml", generate_config("landing"))?;
//! ```

/// Browser-side page behavior shipped as `src/js/main.js`.
///
/// On DOM ready it drops the `preload` body class, polyfills external SVG
/// sprite references, wires `.open-popup` links to a product modal filled
/// from the clicked catalog item, and styles every `<select>`.
pub const PAGE_SCRIPT: &str = include_str!("page.js");

/// npm packages providing the default plugin bundle, with version ranges.
pub const PLUGIN_PACKAGES: [(&str, &str); 4] = [
    ("jquery", "^3.7.1"),
    ("svg4everybody", "^2.1.9"),
    ("jquery-nice-select", "^1.1.0"),
    ("magnific-popup", "^1.1.0"),
];

/// Generate `webpipe.toml`.
pub fn generate_config(name: &str) -> String {
    format!(
        r#"# webpipe configuration
# Every section is optional; the values shown are the defaults.

[project]
name = "{name}"
src = "src"

[sass]
out = "."
browsers = ["defaults"]
pack_media_queries = true
minify = true
source_map = "inline"

[scripts]
output = "js/main.js"
minify = false
source_map = "file"

[deps]
plugins = [
    "node_modules/jquery/dist/jquery.js",
    "node_modules/svg4everybody/dist/svg4everybody.js",
    "node_modules/jquery-nice-select/js/jquery.nice-select.js",
    "node_modules/magnific-popup/dist/jquery.magnific-popup.js",
]

[images]
jpeg_quality = 70
png_level = 2

[favicon]
source = "src/img/favicon.png"

[favicon.icons]
favicons = true
coast = {{ offset = 25 }}

[serve]
port = 3000

# [aggregates]
# assets = ["img", "svg", "fonts"]
"#
    )
}

/// Generate `package.json` pinning the plugin packages.
pub fn generate_package_json(name: &str) -> String {
    let dependencies: serde_json::Map<String, serde_json::Value> =
        PLUGIN_PACKAGES.iter().map(|(pkg, version)| (pkg.to_string(), serde_json::Value::from(*version))).collect();
    let package = serde_json::json!({
        "name": name,
        "private": true,
        "version": "0.1.0",
        "dependencies": dependencies,
    });
    let mut out = serde_json::to_string_pretty(&package).unwrap_or_default();
    out.push('\n');
    out
}

/// Generate `.gitignore` covering generated output.
pub fn generate_gitignore() -> String {
    r#"# webpipe output
/*.html
/style.css
/style.css.map
/css/
/js/
/img/
/fonts/

# npm
node_modules/

# OS files
.DS_Store
Thumbs.db
"#
    .to_string()
}

/// Generate `src/html/index.html`.
pub fn generate_index_html(name: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{name}</title>
    <link rel="icon" href="img/favicons/favicon.ico">
    <link rel="stylesheet" href="style.css">
</head>
<body class="preload">
    @include('inc/header.html', {{"title": "{name}"}})

    <main class="page">
        <p>Edit <code>src/html/index.html</code> and save to reload.</p>
    </main>

    <script src="js/deps.js"></script>
    <script src="js/main.js"></script>
</body>
</html>
"#
    )
}

/// Generate the `src/html/inc/header.html` partial.
pub fn generate_header_html() -> String {
    r#"<header class="header">
    <h1 class="header__title">@title</h1>
</header>
"#
    .to_string()
}

/// Generate `src/sass/style.scss`.
pub fn generate_style_scss() -> String {
    r#"@import 'vars';

body {
    margin: 0;
    font-family: $font-main;
    color: $color-text;

    &.preload * {
        transition: none !important;
    }
}

.header {
    padding: 20px;

    &__title {
        margin: 0;
    }
}

@media (max-width: 767px) {
    .header {
        padding: 10px;
    }
}
"#
    .to_string()
}

/// Generate the `src/sass/_vars.scss` partial.
pub fn generate_vars_scss() -> String {
    "$font-main: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;\n$color-text: #222;\n".to_string()
}
