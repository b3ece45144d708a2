//! Sass compilation stage.

use crate::build::{with_extension, write_output, BuildContext, Stage, StageError, StageOutput};
use crate::stages::css::{postprocess, CssOptions};
use crate::stages::sourcemap::{self, CommentStyle};
use std::path::Path;

/// Compiles `.scss`/`.sass` entry points to post-processed CSS.
///
/// Files whose name starts with `_` are partials: they are only reachable
/// through `@use`/`@import` and never produce output of their own.
#[derive(Debug, Default)]
pub struct SassStage;

impl Stage for SassStage {
    fn name(&self) -> &str {
        "sass"
    }

    fn description(&self) -> &str {
        "Compile Sass, add vendor prefixes, pack media queries, minify"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageOutput, StageError> {
        let config = &ctx.config().sass;
        let options = CssOptions::from_config(config).map_err(StageError::Config)?;
        let load_paths: Vec<_> = config.include_paths.iter().map(|p| ctx.resolve_path(p)).collect();
        let out_dir = ctx.resolve_path(&config.out);

        let mut output = StageOutput::new();
        for file in config.sources.resolve(ctx.project_root())? {
            if is_partial(&file.path) {
                continue;
            }

            let display = ctx.display_path(&file.path).into_owned();
            let compiled = match compile(&file.path, &load_paths) {
                Ok(css) => css,
                Err(message) => {
                    output.fail(&file.path, message);
                    continue;
                }
            };

            let mut processed = match postprocess(&compiled, &display, &options) {
                Ok(processed) => processed,
                Err(message) => {
                    output.fail(&file.path, message);
                    continue;
                }
            };

            let css_path = out_dir.join(with_extension(&file.relative, "css"));
            let mut code = processed.code;
            let map_file = match processed.map.as_mut() {
                Some(map) => {
                    match sourcemap::attach(map, config.source_map, &css_path, CommentStyle::Css, &mut code) {
                        Ok(map_file) => map_file,
                        Err(message) => {
                            output.fail(&file.path, message);
                            continue;
                        }
                    }
                }
                None => None,
            };

            write_output(&css_path, &code)?;
            output.wrote(css_path);
            if let Some(map_file) = map_file {
                write_output(&map_file.path, &map_file.json)?;
                output.wrote(map_file.path);
            }
        }

        Ok(output)
    }
}

fn is_partial(path: &Path) -> bool {
    path.file_name().map(|n| n.to_string_lossy().starts_with('_')).unwrap_or(false)
}

/// Compile one entry point; the syntax follows the file extension.
fn compile(path: &Path, load_paths: &[std::path::PathBuf]) -> Result<String, String> {
    let options = load_paths
        .iter()
        .fold(grass::Options::default().style(grass::OutputStyle::Expanded), |opts, p| opts.load_path(p));
    grass::from_path(path, &options).map_err(|e| e.to_string())
}
