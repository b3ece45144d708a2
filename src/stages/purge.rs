//! Unused CSS removal.
//!
//! Selectors naming a class or id that never appears in the content files are
//! dropped; a style rule left without selectors goes with them, and so does a
//! `@media`/`@supports` block left without rules. Selectors without classes or
//! ids are always kept.

use crate::build::{read_text, write_output, BuildContext, Stage, StageError, StageOutput};
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::traits::ToCss;
use regex::Regex;
use std::collections::HashSet;

/// Identifier-like tokens of the content files.
pub struct Extractor {
    token: Regex,
    selector_name: Regex,
    quoted: Regex,
}

impl Extractor {
    /// Compile the extraction patterns.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token: Regex::new(r"[A-Za-z0-9_-]+")?,
            selector_name: Regex::new(r"[.#](-?[_A-Za-z][A-Za-z0-9_-]*)")?,
            quoted: Regex::new(r#""[^"]*"|'[^']*'"#)?,
        })
    }

    /// Add every token of `content` to `used`.
    pub fn collect(&self, content: &str, used: &mut HashSet<String>) {
        used.extend(self.token.find_iter(content).map(|m| m.as_str().to_string()));
    }

    /// Class and id names referenced by a serialized selector.
    pub fn selector_names(&self, selector: &str) -> Vec<String> {
        let unquoted = self.quoted.replace_all(selector, "");
        self.selector_name.captures_iter(&unquoted).map(|c| c[1].to_string()).collect()
    }
}

/// Result of purging one stylesheet.
#[derive(Debug, Clone)]
pub struct Purged {
    /// Minified stylesheet
    pub code: String,
    /// Number of selectors removed
    pub removed: usize,
}

/// Remove selectors not backed by `used` tokens.
pub fn purge(css: &str, filename: &str, used: &HashSet<String>, extractor: &Extractor) -> Result<Purged, String> {
    let mut sheet = StyleSheet::parse(css, ParserOptions { filename: filename.to_string(), ..ParserOptions::default() })
        .map_err(|e| e.to_string())?;

    let removed = purge_rules(&mut sheet.rules, used, extractor)?;

    let printed = sheet.to_css(PrinterOptions { minify: true, ..PrinterOptions::default() }).map_err(|e| e.to_string())?;
    Ok(Purged { code: printed.code, removed })
}

fn purge_rules(rules: &mut CssRuleList, used: &HashSet<String>, extractor: &Extractor) -> Result<usize, String> {
    let mut removed = 0;
    let mut kept = Vec::with_capacity(rules.0.len());

    for mut rule in rules.0.drain(..) {
        let keep = match &mut rule {
            CssRule::Style(style) => {
                let before = style.selectors.0.len();
                let mut verdicts = Vec::with_capacity(before);
                for selector in style.selectors.0.iter() {
                    let text = selector.to_css_string(PrinterOptions::default()).map_err(|e| e.to_string())?;
                    verdicts.push(extractor.selector_names(&text).iter().all(|name| used.contains(name)));
                }
                let mut verdicts = verdicts.into_iter();
                style.selectors.0.retain(|_| verdicts.next().unwrap_or(true));
                removed += before - style.selectors.0.len();
                !style.selectors.0.is_empty()
            }
            CssRule::Media(media) => {
                removed += purge_rules(&mut media.rules, used, extractor)?;
                !media.rules.0.is_empty()
            }
            CssRule::Supports(supports) => {
                removed += purge_rules(&mut supports.rules, used, extractor)?;
                !supports.rules.0.is_empty()
            }
            _ => true,
        };
        if keep {
            kept.push(rule);
        }
    }

    rules.0 = kept;
    Ok(removed)
}

/// Rewrites the compiled stylesheet without unused selectors.
#[derive(Debug, Default)]
pub struct PurgeStage;

impl Stage for PurgeStage {
    fn name(&self) -> &str {
        "purgecss"
    }

    fn description(&self) -> &str {
        "Remove CSS selectors unused by pages and scripts"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageOutput, StageError> {
        let config = &ctx.config().purge;
        let stylesheet = ctx.resolve_path(&config.stylesheet);

        let mut output = StageOutput::new();
        if !stylesheet.is_file() {
            return Ok(output);
        }

        let extractor = Extractor::new().map_err(|e| StageError::Config(e.to_string()))?;
        let mut used = HashSet::new();
        for file in config.content.resolve(ctx.project_root())? {
            extractor.collect(&read_text(&file.path)?, &mut used);
        }

        let css = read_text(&stylesheet)?;
        match purge(&css, &ctx.display_path(&stylesheet), &used, &extractor) {
            Ok(purged) => {
                write_output(&stylesheet, purged.code)?;
                output.wrote(stylesheet);
            }
            Err(message) => output.fail(&stylesheet, message),
        }
        Ok(output)
    }
}
