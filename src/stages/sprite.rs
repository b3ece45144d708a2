//! SVG symbol sprite.
//!
//! Every icon becomes a `<symbol>` of one sprite document, referenced from
//! pages as `img/sprite.svg#<id>`. Configured attributes (by default `fill`)
//! are removed so icons take their color from CSS.

use crate::build::{read_text, write_output, BuildContext, Stage, StageError, StageOutput};
use regex::{Captures, Regex};
use std::path::Path;

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

const TAG_PATTERN: &str =
    r#"<(/?)([A-Za-z][\w:.-]*)((?:\s+[^\s=/>]+(?:\s*=\s*(?:"[^"]*"|'[^']*'))?)*)\s*(/?)>"#;
const PROLOG_PATTERN: &str = r"(?s)<\?.*?\?>|<!--.*?-->|<!DOCTYPE[^>]*>";

/// An icon parsed out of one SVG file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Fragment id in the sprite
    pub id: String,
    /// `viewBox` of the source document
    pub view_box: Option<String>,
    /// Inner markup of the root `<svg>`
    pub body: String,
}

/// Symbol id for an icon: its path below the sprite directory without the
/// extension, directories joined with `--`.
pub fn symbol_id(relative: &Path) -> String {
    let without_ext = relative.with_extension("");
    without_ext.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect::<Vec<_>>().join("--")
}

/// Byte offsets of the root element.
struct RootSpan {
    open_start: usize,
    open_end: usize,
    close_start: usize,
}

/// Parses icon documents into symbols.
pub struct IconParser {
    tag: Regex,
    prolog: Regex,
    strip: Option<Regex>,
}

impl IconParser {
    /// Create a parser removing the named attributes from every element.
    pub fn new(strip_attributes: &[String]) -> Result<Self, regex::Error> {
        let strip = if strip_attributes.is_empty() {
            None
        } else {
            let names = strip_attributes.iter().map(|n| regex::escape(n)).collect::<Vec<_>>().join("|");
            Some(Regex::new(&format!(r#"\s+(?:{})\s*=\s*(?:"[^"]*"|'[^']*')"#, names))?)
        };
        Ok(Self { tag: Regex::new(TAG_PATTERN)?, prolog: Regex::new(PROLOG_PATTERN)?, strip })
    }

    /// Parse one icon document.
    pub fn parse(&self, id: String, source: &str) -> Result<Symbol, String> {
        let cleaned = self.prolog.replace_all(source, "");
        let span = self.root_span(&cleaned)?;

        let open = self
            .tag
            .captures(&cleaned[span.open_start..span.open_end])
            .ok_or_else(|| "no root element".to_string())?;
        if &open[2] != "svg" {
            return Err(format!("root element is <{}>, expected <svg>", &open[2]));
        }
        let attrs = &open[3];

        let view_box = attribute(attrs, "viewBox").or_else(|| {
            let number = |v: String| v.trim_end_matches("px").parse::<f64>().ok();
            let width = number(attribute(attrs, "width")?)?;
            let height = number(attribute(attrs, "height")?)?;
            Some(format!("0 0 {} {}", width, height))
        });

        let body = cleaned[span.open_end..span.close_start].trim();
        Ok(Symbol { id, view_box, body: self.strip_attributes(body) })
    }

    /// Check that tags nest properly and locate the single root element.
    fn root_span(&self, markup: &str) -> Result<RootSpan, String> {
        let mut stack: Vec<&str> = Vec::new();
        let mut root: Option<RootSpan> = None;
        let mut closed = false;

        for caps in self.tag.captures_iter(markup) {
            let Some(whole) = caps.get(0) else { continue };
            let name = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let closing = !caps[1].is_empty();
            let self_closing = !caps[4].is_empty();

            if closed {
                return Err(format!("content after the root element: <{}>", name));
            }

            if closing {
                match stack.pop() {
                    Some(open) if open == name => {
                        if stack.is_empty() {
                            if let Some(span) = root.as_mut() {
                                span.close_start = whole.start();
                            }
                            closed = true;
                        }
                    }
                    Some(open) => return Err(format!("</{}> closes <{}>", name, open)),
                    None => return Err(format!("unexpected </{}>", name)),
                }
            } else {
                if root.is_none() {
                    root = Some(RootSpan {
                        open_start: whole.start(),
                        open_end: whole.end(),
                        close_start: whole.end(),
                    });
                }
                if self_closing {
                    closed = closed || stack.is_empty();
                } else {
                    stack.push(name);
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(format!("unclosed <{}>", open));
        }
        root.ok_or_else(|| "no root element".to_string())
    }

    fn strip_attributes(&self, markup: &str) -> String {
        let Some(strip) = &self.strip else {
            return markup.to_string();
        };
        self.tag
            .replace_all(markup, |caps: &Captures| {
                let attrs = strip.replace_all(&caps[3], "");
                format!("<{}{}{}{}>", &caps[1], &caps[2], attrs, &caps[4])
            })
            .into_owned()
    }
}

fn attribute(attrs: &str, name: &str) -> Option<String> {
    let re = Regex::new(&format!(r#"(?:^|\s){}\s*=\s*(?:"([^"]*)"|'([^']*)')"#, regex::escape(name))).ok()?;
    let caps = re.captures(attrs)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string())
}

/// Assemble symbols into a sprite document.
pub fn assemble(symbols: &[Symbol]) -> String {
    let mut out = format!("<svg xmlns=\"{}\" xmlns:xlink=\"{}\">", SVG_NS, XLINK_NS);
    for symbol in symbols {
        out.push_str(&format!("<symbol id=\"{}\"", symbol.id));
        if let Some(view_box) = &symbol.view_box {
            out.push_str(&format!(" viewBox=\"{}\"", view_box));
        }
        out.push('>');
        out.push_str(&symbol.body);
        out.push_str("</symbol>");
    }
    out.push_str("</svg>\n");
    out
}

/// Builds `img/sprite.svg` from `src/img/sprite/`.
#[derive(Debug, Default)]
pub struct SpriteStage;

impl Stage for SpriteStage {
    fn name(&self) -> &str {
        "svg"
    }

    fn description(&self) -> &str {
        "Combine SVG icons into a symbol sprite"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageOutput, StageError> {
        let config = &ctx.config().sprite;
        let files = config.sources.resolve(ctx.project_root())?;

        let mut output = StageOutput::new();
        if files.is_empty() {
            return Ok(output);
        }

        let parser = IconParser::new(&config.strip_attributes).map_err(|e| StageError::Config(e.to_string()))?;
        let mut symbols = Vec::with_capacity(files.len());
        for file in &files {
            let source = read_text(&file.path)?;
            match parser.parse(symbol_id(&file.relative), &source) {
                Ok(symbol) => symbols.push(symbol),
                Err(message) => output.fail(&file.path, message),
            }
        }
        if !output.failures.is_empty() {
            return Ok(output);
        }

        let dest = ctx.resolve_path(&config.output);
        write_output(&dest, assemble(&symbols))?;
        output.wrote(dest);
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::fs;
    use tempfile::TempDir;

    fn parse(source: &str) -> Result<Symbol, String> {
        IconParser::new(&["fill".to_string()]).unwrap().parse("icon".to_string(), source)
    }

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_symbol_id() {
        assert_eq!(symbol_id(Path::new("arrow.svg")), "arrow");
        assert_eq!(symbol_id(Path::new("social/vk.svg")), "social--vk");
    }

    #[test]
    fn test_parse_strips_fill_only() {
        let svg = r##"<?xml version="1.0"?>
<!-- icon -->
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" fill="none">
  <path fill="#000" fill-rule="evenodd" d="M0 0h24v24H0z"/>
</svg>"##;
        let symbol = parse(svg).unwrap();

        assert_eq!(symbol.view_box.as_deref(), Some("0 0 24 24"));
        assert_eq!(symbol.body, r#"<path fill-rule="evenodd" d="M0 0h24v24H0z"/>"#);
    }

    #[test]
    fn test_view_box_from_dimensions() {
        let svg = r#"<svg width="16px" height="16"><rect width="16" height="16"/></svg>"#;
        let symbol = parse(svg).unwrap();
        assert_eq!(symbol.view_box.as_deref(), Some("0 0 16 16"));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(parse("<svg><g></svg>").is_err());
        assert!(parse("<svg><path/>").is_err());
        assert!(parse("not svg at all").is_err());
        assert!(parse("<div></div>").is_err());
        assert!(parse("<svg></svg><svg></svg>").is_err());
    }

    #[test]
    fn test_assemble() {
        let symbols = vec![
            Symbol { id: "a".into(), view_box: Some("0 0 1 1".into()), body: "<g/>".into() },
            Symbol { id: "b".into(), view_box: None, body: String::new() },
        ];
        let sprite = assemble(&symbols);
        assert!(sprite.starts_with("<svg xmlns=\"http://www.w3.org/2000/svg\""));
        assert!(sprite.contains("<symbol id=\"a\" viewBox=\"0 0 1 1\"><g/></symbol><symbol id=\"b\"></symbol>"));
    }

    #[test]
    fn test_stage_builds_sprite() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/img/sprite/phone.svg", r#"<svg viewBox="0 0 10 10"><circle fill="red" r="5"/></svg>"#);
        write(temp.path(), "src/img/sprite/social/tg.svg", r#"<svg viewBox="0 0 8 8"><path d="M0 0"/></svg>"#);
        let ctx = BuildContext::new(SiteConfig::with_name("t"), temp.path().to_path_buf());

        let output = SpriteStage.run(&ctx).unwrap();

        assert_eq!(output.written, vec![temp.path().join("img/sprite.svg")]);
        let sprite = fs::read_to_string(temp.path().join("img/sprite.svg")).unwrap();
        assert!(sprite.contains(r#"<symbol id="phone" viewBox="0 0 10 10"><circle r="5"/></symbol>"#));
        assert!(sprite.contains(r#"<symbol id="social--tg""#));
        assert!(sprite.find("phone").unwrap() < sprite.find("social--tg").unwrap());
    }

    #[test]
    fn test_stage_malformed_source_writes_nothing() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "img/sprite.svg", "previous");
        write(temp.path(), "src/img/sprite/ok.svg", "<svg><path/></svg>");
        write(temp.path(), "src/img/sprite/broken.svg", "<svg><g></svg>");
        let ctx = BuildContext::new(SiteConfig::with_name("t"), temp.path().to_path_buf());

        let output = SpriteStage.run(&ctx).unwrap();

        assert_eq!(output.failures.len(), 1);
        assert!(output.written.is_empty());
        assert_eq!(fs::read_to_string(temp.path().join("img/sprite.svg")).unwrap(), "previous");
    }

    #[test]
    fn test_no_icons_no_sprite() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(SiteConfig::with_name("t"), temp.path().to_path_buf());
        assert!(SpriteStage.run(&ctx).unwrap().written.is_empty());
        assert!(!temp.path().join("img/sprite.svg").exists());
    }
}
