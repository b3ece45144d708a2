//! HTML include stage.
//!
//! Pages are flattened by expanding `@include('path', {json})` directives
//! (with the configured prefix in place of `@`). Paths resolve relative to
//! the including file. The optional JSON object supplies variables written as
//! `@name` inside the included file; nested includes inherit the variables
//! of their parents.

use crate::build::{write_output, BuildContext, Stage, StageError, StageOutput};
use regex::Regex;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for include resolution failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IncludeError {
    /// An include refers back to a file already being expanded
    #[error("circular include: {}", .0.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" -> "))]
    Cycle(Vec<PathBuf>),
    /// Included file does not exist
    #[error("include file not found '{}' (included from {})", .path.display(), .from.display())]
    Missing {
        /// Resolved include path
        path: PathBuf,
        /// File containing the directive
        from: PathBuf,
    },
    /// Directive could not be parsed
    #[error("{}: malformed include: {message}", .file.display())]
    Syntax {
        /// File containing the directive
        file: PathBuf,
        /// What was wrong
        message: String,
    },
    /// IO error reading a file
    #[error("error reading '{}': {source}", .path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Expands include directives.
#[derive(Debug, Clone)]
pub struct IncludeResolver {
    prefix: String,
    directive: Regex,
}

impl IncludeResolver {
    /// Create a resolver for a directive prefix such as `@`.
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        let directive = Regex::new(&format!(r"{}include\(\s*", regex::escape(prefix)))?;
        Ok(Self { prefix: prefix.to_string(), directive })
    }

    /// Render a page with all of its includes expanded.
    pub fn render(&self, page: &Path) -> Result<String, IncludeError> {
        let text = read(page)?;
        let mut chain = vec![identity(page)];
        self.expand(&text, page, &Map::new(), &mut chain)
    }

    fn expand(
        &self,
        text: &str,
        file: &Path,
        context: &Map<String, Value>,
        chain: &mut Vec<PathBuf>,
    ) -> Result<String, IncludeError> {
        let base = file.parent().unwrap_or(Path::new(""));
        let mut result = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(found) = self.directive.find(rest) {
            result.push_str(&rest[..found.start()]);
            let after = &rest[found.end()..];
            let (directive, consumed) =
                parse_arguments(after).map_err(|message| IncludeError::Syntax { file: file.to_path_buf(), message })?;

            let target = base.join(&directive.path);
            if !target.is_file() {
                return Err(IncludeError::Missing { path: target, from: file.to_path_buf() });
            }

            let id = identity(&target);
            if chain.contains(&id) {
                let mut cycle = chain.clone();
                cycle.push(id);
                return Err(IncludeError::Cycle(cycle));
            }

            let mut inner_context = context.clone();
            inner_context.extend(directive.variables);

            let content = self.substitute(&read(&target)?, &inner_context);
            chain.push(id);
            let expanded = self.expand(&content, &target, &inner_context, chain)?;
            chain.pop();

            result.push_str(&expanded);
            rest = &after[consumed..];
        }

        result.push_str(rest);
        Ok(result)
    }

    /// Replace `<prefix><name>` for every variable in scope.
    ///
    /// Longer names are substituted first so `@title` never clobbers
    /// `@titleClass`. Include directives are left intact whatever the
    /// variable names.
    fn substitute(&self, text: &str, context: &Map<String, Value>) -> String {
        let mut names: Vec<&String> = context.keys().collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        let mut out = text.to_string();
        for name in names {
            let value = match &context[name.as_str()] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let needle = format!("{}{}", self.prefix, name);
            let directives: Vec<usize> = self.directive.find_iter(&out).map(|m| m.start()).collect();

            let mut replaced = String::with_capacity(out.len());
            let mut last = 0;
            for (start, _) in out.match_indices(&needle) {
                if directives.contains(&start) {
                    continue;
                }
                replaced.push_str(&out[last..start]);
                replaced.push_str(&value);
                last = start + needle.len();
            }
            replaced.push_str(&out[last..]);
            out = replaced;
        }
        out
    }
}

struct Directive {
    path: String,
    variables: Map<String, Value>,
}

/// Parse `'path'[, {json}])` and return how many bytes were consumed.
fn parse_arguments(text: &str) -> Result<(Directive, usize), String> {
    let quote = text.chars().next().ok_or("unexpected end of file")?;
    if quote != '\'' && quote != '"' {
        return Err("expected quoted path".to_string());
    }
    let close = text[1..].find(quote).ok_or("unterminated path")? + 1;
    let path = text[1..close].to_string();
    let mut pos = close + 1;

    let skip_ws = |pos: usize| pos + text[pos..].len() - text[pos..].trim_start().len();

    pos = skip_ws(pos);
    let mut variables = Map::new();
    if text[pos..].starts_with(',') {
        pos = skip_ws(pos + 1);
        let len = json_object_len(&text[pos..]).ok_or("unterminated variables object")?;
        let value: Value = serde_json::from_str(&text[pos..pos + len]).map_err(|e| e.to_string())?;
        match value {
            Value::Object(map) => variables = map,
            _ => return Err("variables must be a JSON object".to_string()),
        }
        pos = skip_ws(pos + len);
    }

    if !text[pos..].starts_with(')') {
        return Err("expected ')'".to_string());
    }
    Ok((Directive { path, variables }, pos + 1))
}

/// Length of the balanced `{...}` at the start of `text`, skipping braces in
/// strings.
fn json_object_len(text: &str) -> Option<usize> {
    if !text.starts_with('{') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn read(path: &Path) -> Result<String, IncludeError> {
    fs::read_to_string(path).map_err(|source| IncludeError::Io { path: path.to_path_buf(), source })
}

fn identity(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Flattens HTML pages into the output directory.
#[derive(Debug, Default)]
pub struct HtmlStage;

impl Stage for HtmlStage {
    fn name(&self) -> &str {
        "html"
    }

    fn description(&self) -> &str {
        "Expand HTML includes into flat pages"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageOutput, StageError> {
        let config = &ctx.config().html;
        let resolver = IncludeResolver::new(&config.prefix).map_err(|e| StageError::Config(e.to_string()))?;
        let out_dir = ctx.resolve_path(&config.out);

        let mut output = StageOutput::new();
        for page in config.sources.resolve(ctx.project_root())? {
            match resolver.render(&page.path) {
                Ok(html) => {
                    let dest = out_dir.join(&page.relative);
                    write_output(&dest, html)?;
                    output.wrote(dest);
                }
                Err(IncludeError::Cycle(chain)) => return Err(StageError::IncludeCycle(chain)),
                Err(IncludeError::Io { path, source }) => return Err(StageError::io(path, source)),
                Err(e) => output.fail(&page.path, e.to_string()),
            }
        }
        Ok(output)
    }
}
