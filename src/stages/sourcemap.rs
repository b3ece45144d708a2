//! Source map emission shared by the CSS and script stages.

use crate::config::SourceMapMode;
use parcel_sourcemap::SourceMap;
use std::path::{Path, PathBuf};

/// Comment syntax of the file a map is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `/*# sourceMappingURL=... */`
    Css,
    /// `//# sourceMappingURL=...`
    Js,
}

/// A map file to write next to its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapFile {
    /// Where the map goes (`<output>.map`)
    pub path: PathBuf,
    /// Map JSON
    pub json: String,
}

/// Append the `sourceMappingURL` comment to `code` according to `mode`.
///
/// Returns the map file to write when the mode is [`SourceMapMode::File`].
pub fn attach(
    map: &mut SourceMap,
    mode: SourceMapMode,
    output: &Path,
    style: CommentStyle,
    code: &mut String,
) -> Result<Option<MapFile>, String> {
    let (url, file) = match mode {
        SourceMapMode::None => return Ok(None),
        SourceMapMode::Inline => {
            (map.to_data_url(None).map_err(|e| format!("source map: {:?}", e))?, None)
        }
        SourceMapMode::File => {
            let path = map_path(output);
            let json = map.to_json(None).map_err(|e| format!("source map: {:?}", e))?;
            let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            (name, Some(MapFile { path, json }))
        }
    };

    if !code.ends_with('\n') {
        code.push('\n');
    }
    match style {
        CommentStyle::Css => code.push_str(&format!("/*# sourceMappingURL={} */\n", url)),
        CommentStyle::Js => code.push_str(&format!("//# sourceMappingURL={}\n", url)),
    }
    Ok(file)
}

/// `style.css` -> `style.css.map`
pub fn map_path(output: &Path) -> PathBuf {
    let mut name = output.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".map");
    output.with_file_name(name)
}
