//! CSS post-processing: vendor prefixing, media-query packing, minification.
//!
//! Runs on compiled Sass output through lightningcss. Prefixes come from the
//! browserslist targets; `z-index` values pass through untouched.

use crate::config::{SassConfig, SourceMapMode};
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use lightningcss::traits::ToCss;
use parcel_sourcemap::SourceMap;

/// Post-processing settings resolved from `[sass]`.
#[derive(Debug, Clone)]
pub struct CssOptions {
    /// Prefixing and lowering targets
    pub targets: Targets,
    /// Merge identical media queries and move them to the end
    pub pack_media_queries: bool,
    /// Minify the output
    pub minify: bool,
    /// Whether to build a source map
    pub source_map: bool,
}

impl CssOptions {
    /// Resolve options from the Sass section.
    pub fn from_config(config: &SassConfig) -> Result<Self, String> {
        Ok(Self {
            targets: browser_targets(&config.browsers)?,
            pack_media_queries: config.pack_media_queries,
            minify: config.minify,
            source_map: config.source_map != SourceMapMode::None,
        })
    }
}

/// Turn browserslist queries into lightningcss targets.
pub fn browser_targets(queries: &[String]) -> Result<Targets, String> {
    if queries.is_empty() {
        return Ok(Targets::default());
    }
    let browsers = Browsers::from_browserslist(queries.iter().map(String::as_str))
        .map_err(|e| format!("invalid browsers query: {}", e))?;
    Ok(browsers.map(Targets::from).unwrap_or_default())
}

/// Post-processed stylesheet.
pub struct ProcessedCss {
    /// Final CSS
    pub code: String,
    /// Map from the output back to `filename`, when requested
    pub map: Option<SourceMap>,
}

/// Run the post-processing chain over one stylesheet.
///
/// `filename` names the input in diagnostics and in the source map.
pub fn postprocess(css: &str, filename: &str, options: &CssOptions) -> Result<ProcessedCss, String> {
    let mut sheet = StyleSheet::parse(css, ParserOptions { filename: filename.to_string(), ..ParserOptions::default() })
        .map_err(|e| e.to_string())?;

    if options.pack_media_queries {
        pack_media_queries(&mut sheet.rules)?;
    }

    sheet
        .minify(MinifyOptions { targets: options.targets, ..MinifyOptions::default() })
        .map_err(|e| e.to_string())?;

    let mut map = if options.source_map {
        let mut map = SourceMap::new("/");
        let source = map.add_source(filename);
        map.set_source_content(source as usize, css).map_err(|e| format!("source map: {:?}", e))?;
        Some(map)
    } else {
        None
    };

    let printed = sheet
        .to_css(PrinterOptions {
            minify: options.minify,
            targets: options.targets,
            source_map: map.as_mut(),
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;

    Ok(ProcessedCss { code: printed.code, map })
}

/// Merge top-level `@media` blocks with identical queries and move them after
/// all other rules, in order of first appearance.
pub fn pack_media_queries(rules: &mut CssRuleList) -> Result<(), String> {
    let mut kept = Vec::with_capacity(rules.0.len());
    let mut groups: Vec<(String, CssRule)> = Vec::new();

    for rule in rules.0.drain(..) {
        match rule {
            CssRule::Media(media) => {
                let key = media.query.to_css_string(PrinterOptions::default()).map_err(|e| e.to_string())?;
                match groups.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, CssRule::Media(existing))) => existing.rules.0.extend(media.rules.0),
                    _ => groups.push((key, CssRule::Media(media))),
                }
            }
            other => kept.push(other),
        }
    }

    kept.extend(groups.into_iter().map(|(_, rule)| rule));
    rules.0 = kept;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(minify: bool, pack: bool) -> CssOptions {
        CssOptions { targets: Targets::default(), pack_media_queries: pack, minify, source_map: false }
    }

    #[test]
    fn test_minifies() {
        let out = postprocess(".a {\n  color: red;\n}\n", "style.scss", &options(true, false)).unwrap();
        assert_eq!(out.code, ".a{color:red}");
    }

    #[test]
    fn test_z_index_untouched() {
        let css = ".modal { z-index: 9999; }\n.tooltip { z-index: 500; }";
        let out = postprocess(css, "style.scss", &options(true, false)).unwrap();
        assert!(out.code.contains("z-index:9999"));
        assert!(out.code.contains("z-index:500"));
    }

    #[test]
    fn test_packs_media_queries_to_end() {
        let css = "@media (min-width: 768px) { .a { color: red } }\n\
                   .b { color: blue }\n\
                   @media (min-width: 768px) { .c { color: green } }\n\
                   .d { color: black }";
        let out = postprocess(css, "style.scss", &options(false, true)).unwrap();

        assert_eq!(out.code.matches("@media").count(), 1);
        let media = out.code.find("@media").unwrap();
        assert!(out.code.find(".d").unwrap() < media);
        assert!(out.code.find(".a").unwrap() > media);
        assert!(out.code.find(".c").unwrap() > out.code.find(".a").unwrap());
    }

    #[test]
    fn test_distinct_queries_keep_first_appearance_order() {
        let css = "@media (max-width: 500px) { .x { top: 0 } }\n\
                   @media (min-width: 900px) { .y { top: 0 } }\n\
                   @media (max-width: 500px) { .z { top: 0 } }";
        let out = postprocess(css, "style.scss", &options(false, true)).unwrap();

        assert_eq!(out.code.matches("@media").count(), 2);
        assert!(out.code.find("max-width").unwrap() < out.code.find("min-width").unwrap());
    }

    #[test]
    fn test_adds_vendor_prefixes_for_old_browsers() {
        let targets = browser_targets(&["safari 8".to_string()]).unwrap();
        let opts = CssOptions { targets, pack_media_queries: false, minify: true, source_map: false };
        let out = postprocess(".a { user-select: none; }", "style.scss", &opts).unwrap();
        assert!(out.code.contains("-webkit-user-select:none"));
    }

    #[test]
    fn test_invalid_browsers_query() {
        assert!(browser_targets(&["not a real browser 99".to_string()]).is_err());
    }

    #[test]
    fn test_source_map_built() {
        let opts = CssOptions { targets: Targets::default(), pack_media_queries: false, minify: true, source_map: true };
        let mut out = postprocess(".a {\n  color: red;\n}\n", "style.scss", &opts).unwrap();
        let json = out.map.as_mut().unwrap().to_json(None).unwrap();
        assert!(json.contains("style.scss"));
    }

    #[test]
    fn test_deterministic() {
        let css = "@media print { .a { color: red } } .b { margin: 0 auto }";
        let a = postprocess(css, "s.scss", &options(true, true)).unwrap().code;
        let b = postprocess(css, "s.scss", &options(true, true)).unwrap().code;
        assert_eq!(a, b);
    }
}
