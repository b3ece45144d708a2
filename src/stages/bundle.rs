//! Script bundling: first-party scripts and third-party plugins.
//!
//! Both stages concatenate an ordered list of files with `\n`. The order is
//! the declaration order of the sources, never filesystem order.

use crate::build::{read_text, write_output, BuildContext, Stage, StageError, StageOutput};
use crate::config::SourceMapMode;
use crate::stages::sourcemap::{self, CommentStyle};
use oxc::allocator::Allocator;
use oxc::codegen::{CodeGenerator, CodegenOptions};
use oxc::minifier::{Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use parcel_sourcemap::{OriginalLocation, SourceMap};
use std::path::{Path, PathBuf};

/// One input of a bundle.
#[derive(Debug, Clone)]
pub struct BundleSource {
    /// Name recorded in the source map
    pub name: String,
    /// File contents
    pub code: String,
}

/// Concatenated bundle.
pub struct Bundle {
    /// Bundle text
    pub code: String,
    /// Line-level map back to the sources
    pub map: SourceMap,
}

/// Concatenate sources in order and map every output line to its origin.
pub fn concat(sources: &[BundleSource]) -> Result<Bundle, String> {
    let mut map = SourceMap::new("/");
    let mut line_offset = 0u32;

    for source in sources {
        let index = map.add_source(&source.name);
        map.set_source_content(index as usize, &source.code).map_err(|e| format!("source map: {:?}", e))?;

        let lines = source.code.split('\n').count() as u32;
        for line in 0..lines {
            map.add_mapping(
                line_offset + line,
                0,
                Some(OriginalLocation { original_line: line, original_column: 0, source: index, name: None }),
            );
        }
        line_offset += lines;
    }

    let code = sources.iter().map(|s| s.code.as_str()).collect::<Vec<_>>().join("\n");
    Ok(Bundle { code, map })
}

/// Minify a script.
///
/// Plugins are classic scripts sharing one global scope, so top-level names
/// are kept. Parse errors come back as `Err` with the first diagnostic.
pub fn minify(code: &str) -> Result<String, String> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, code, SourceType::cjs()).parse();
    if let Some(error) = parsed.errors.first() {
        return Err(format!("syntax error: {}", error));
    }
    if parsed.panicked {
        return Err("syntax error".to_string());
    }

    let mut program = parsed.program;
    let minified = Minifier::new(MinifierOptions::default()).build(&allocator, &mut program);
    let printed = CodeGenerator::new()
        .with_options(CodegenOptions { minify: true, ..CodegenOptions::default() })
        .with_mangler(minified.mangler)
        .build(&program);
    Ok(printed.code)
}

/// Write a bundle (and its map) unless a transform fails.
fn emit(
    sources: &[BundleSource],
    dest: &Path,
    minify_output: bool,
    map_mode: SourceMapMode,
    blame: &Path,
    output: &mut StageOutput,
) -> Result<(), StageError> {
    let mut bundle = match concat(sources) {
        Ok(bundle) => bundle,
        Err(message) => {
            output.fail(blame, message);
            return Ok(());
        }
    };

    let mut map_mode = map_mode;
    if minify_output && map_mode != SourceMapMode::None {
        output.warn("source map skipped for minified bundle");
        map_mode = SourceMapMode::None;
    }

    let mut code = if minify_output {
        match minify(&bundle.code) {
            Ok(code) => code,
            Err(message) => {
                output.fail(blame, message);
                return Ok(());
            }
        }
    } else {
        bundle.code
    };

    let map_file = match sourcemap::attach(&mut bundle.map, map_mode, dest, CommentStyle::Js, &mut code) {
        Ok(map_file) => map_file,
        Err(message) => {
            output.fail(blame, message);
            return Ok(());
        }
    };

    write_output(dest, &code)?;
    output.wrote(dest);
    if let Some(map_file) = map_file {
        write_output(&map_file.path, &map_file.json)?;
        output.wrote(map_file.path);
    }
    Ok(())
}

/// Bundles first-party scripts into `js/main.js`.
#[derive(Debug, Default)]
pub struct ScriptsStage;

impl Stage for ScriptsStage {
    fn name(&self) -> &str {
        "scripts"
    }

    fn description(&self) -> &str {
        "Concatenate project scripts with a source map"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageOutput, StageError> {
        let config = &ctx.config().scripts;
        let files = config.sources.resolve(ctx.project_root())?;

        let mut output = StageOutput::new();
        if files.is_empty() {
            return Ok(output);
        }

        let sources = files
            .iter()
            .map(|f| Ok(BundleSource { name: ctx.display_path(&f.path).into_owned(), code: read_text(&f.path)? }))
            .collect::<Result<Vec<_>, StageError>>()?;

        let dest = ctx.resolve_path(&config.output);
        let blame = files.last().map(|f| f.path.clone()).unwrap_or_else(|| dest.clone());
        emit(&sources, &dest, config.minify, config.source_map, &blame, &mut output)?;
        Ok(output)
    }
}

/// Bundles third-party plugins into `js/deps.js`.
///
/// Unlike project scripts, every plugin is listed explicitly; a missing one
/// is an installation problem and fails the task.
#[derive(Debug, Default)]
pub struct DepsStage;

impl Stage for DepsStage {
    fn name(&self) -> &str {
        "deps"
    }

    fn description(&self) -> &str {
        "Concatenate and minify third-party plugins"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageOutput, StageError> {
        let config = &ctx.config().deps;
        let mut output = StageOutput::new();
        if config.plugins.is_empty() {
            return Ok(output);
        }

        let paths: Vec<PathBuf> = config.plugins.iter().map(|p| ctx.resolve_path(p)).collect();
        let mut sources = Vec::with_capacity(paths.len());
        for path in &paths {
            if !path.is_file() {
                return Err(StageError::MissingSource(path.clone()));
            }
            sources.push(BundleSource { name: ctx.display_path(path).into_owned(), code: read_text(path)? });
        }

        let dest = ctx.resolve_path(&config.output);
        emit(&sources, &dest, config.minify, SourceMapMode::None, &dest, &mut output)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn source(name: &str, code: &str) -> BundleSource {
        BundleSource { name: name.to_string(), code: code.to_string() }
    }

    #[test]
    fn test_concat_joins_with_newline() {
        let bundle = concat(&[source("a.js", "var a = 1;"), source("b.js", "var b = 2;")]).unwrap();
        assert_eq!(bundle.code, "var a = 1;\nvar b = 2;");
    }

    #[test]
    fn test_concat_maps_lines_to_sources() {
        let mut bundle = concat(&[source("a.js", "one\ntwo"), source("b.js", "three")]).unwrap();

        let mapping = bundle.map.find_closest_mapping(2, 0).unwrap();
        let original = mapping.original.unwrap();
        assert_eq!(original.original_line, 0);
        assert_eq!(bundle.map.get_source(original.source).unwrap(), "b.js");

        let json = bundle.map.to_json(None).unwrap();
        assert!(json.contains("a.js"));
    }

    #[test]
    fn test_minify() {
        let out = minify("function hello(name) {\n  return 'hi ' + name;\n}\n").unwrap();
        assert!(out.len() < 45, "{}", out);
        assert!(out.contains("hello"));
    }

    #[test]
    fn test_minify_syntax_error() {
        assert!(minify("function (").is_err());
    }

    #[test]
    fn test_minify_modern_syntax() {
        assert!(minify("const f = async () => { for await (const x of y) { g(x); } };").is_ok());
        assert!(minify("function Foo() { if (!new.target) { return new Foo(); } }").is_ok());
    }

    #[test]
    fn test_minify_keeps_globals_and_branches() {
        let out = minify("var plugin = {};\nif (a) b(); else c();\n").unwrap();
        assert!(out.contains("plugin"), "{}", out);
        assert!(out.contains("b()"), "{}", out);
        assert!(out.contains("c()"), "{}", out);
    }

    #[test]
    fn test_scripts_order_and_map() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/js/main.js", "main();");
        write(temp.path(), "src/js/inc/b.js", "b();");
        write(temp.path(), "src/js/inc/a.js", "a();");

        let ctx = BuildContext::new(SiteConfig::with_name("t"), temp.path().to_path_buf());
        let output = ScriptsStage.run(&ctx).unwrap();

        assert_eq!(output.written.len(), 2);
        let js = fs::read_to_string(temp.path().join("js/main.js")).unwrap();
        assert_eq!(js, "a();\nb();\nmain();\n//# sourceMappingURL=main.js.map\n");
        let map = fs::read_to_string(temp.path().join("js/main.js.map")).unwrap();
        assert!(map.contains("src/js/inc/a.js"));
    }

    #[test]
    fn test_scripts_minified_skips_map() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/js/main.js", "var answer = 42;\nif (answer) show(answer); else hide();\n");

        let mut config = SiteConfig::with_name("t");
        config.scripts.minify = true;
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        let output = ScriptsStage.run(&ctx).unwrap();

        assert_eq!(output.written, vec![temp.path().join("js/main.js")]);
        assert!(output.failures.is_empty());
        assert_eq!(output.warnings.len(), 1);
        assert!(!temp.path().join("js/main.js.map").exists());
    }

    #[test]
    fn test_scripts_syntax_error_keeps_previous_bundle() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "js/main.js", "previous");
        write(temp.path(), "src/js/main.js", "function (");

        let mut config = SiteConfig::with_name("t");
        config.scripts.minify = true;
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        let output = ScriptsStage.run(&ctx).unwrap();

        assert_eq!(output.failures.len(), 1);
        assert_eq!(fs::read_to_string(temp.path().join("js/main.js")).unwrap(), "previous");
    }

    #[test]
    fn test_deps_keep_declared_order() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "node_modules/zz/z.js", "var z = 1;");
        write(temp.path(), "node_modules/aa/a.js", "var a = z;");

        let mut config = SiteConfig::with_name("t");
        config.deps.plugins = vec![PathBuf::from("node_modules/zz/z.js"), PathBuf::from("node_modules/aa/a.js")];
        config.deps.minify = false;
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        DepsStage.run(&ctx).unwrap();

        let js = fs::read_to_string(temp.path().join("js/deps.js")).unwrap();
        assert_eq!(js, "var z = 1;\nvar a = z;");
    }

    #[test]
    fn test_deps_minifies_plugin_code() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "node_modules/jq/jquery.js",
            "(function (global, factory) {\n  if (typeof module === 'object') { module.exports = factory(global); }\n  else { factory(global); }\n})(this, function (window) {\n  var jQuery = function (selector) { return new jQuery.fn.init(selector); };\n  jQuery.fn = jQuery.prototype = { init: function (s) { this.selector = s; return this; } };\n  window.jQuery = window.$ = jQuery;\n  return jQuery;\n});\n",
        );
        write(
            temp.path(),
            "node_modules/slider/slider.js",
            "(function ($) {\n  $.fn.slider = function (options) {\n    var speed = options && options.speed ? options.speed : 300;\n    if (speed > 1000) { speed = 1000; } else if (speed < 0) { speed = 0; } else { speed = speed | 0; }\n    return this.each(function () { $(this).data('speed', speed); });\n  };\n})(jQuery);\n",
        );

        let mut config = SiteConfig::with_name("t");
        config.deps.plugins =
            vec![PathBuf::from("node_modules/jq/jquery.js"), PathBuf::from("node_modules/slider/slider.js")];
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        let output = DepsStage.run(&ctx).unwrap();

        assert!(output.failures.is_empty(), "{:?}", output.failures);
        let js = fs::read_to_string(temp.path().join("js/deps.js")).unwrap();
        assert!(js.contains("jQuery"));
        assert!(js.contains("slider"));
        assert!(js.find("jQuery").unwrap() < js.find("slider").unwrap());
        assert!(!js.contains("\n  "));
    }

    #[test]
    fn test_deps_syntax_error_is_recoverable() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "js/deps.js", "previous");
        write(temp.path(), "node_modules/bad/bad.js", "function (");

        let mut config = SiteConfig::with_name("t");
        config.deps.plugins = vec![PathBuf::from("node_modules/bad/bad.js")];
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        let output = DepsStage.run(&ctx).unwrap();

        assert_eq!(output.failures.len(), 1);
        assert_eq!(fs::read_to_string(temp.path().join("js/deps.js")).unwrap(), "previous");
    }

    #[test]
    fn test_deps_missing_plugin_is_fatal() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(SiteConfig::with_name("t"), temp.path().to_path_buf());
        assert!(matches!(DepsStage.run(&ctx), Err(StageError::MissingSource(_))));
        assert!(!temp.path().join("js/deps.js").exists());
    }
}
