//! Generated output removal.

use crate::build::{BuildContext, Stage, StageError, StageOutput};
use glob::Pattern;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Deletes the configured output paths.
///
/// Patterns are globs relative to the project root. Nothing inside the
/// source directory is ever removed, and neither is the root itself.
#[derive(Debug, Default)]
pub struct CleanStage;

/// Paths matched by the clean patterns that may be deleted.
pub fn targets(root: &Path, src: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, StageError> {
    let escaped_root = Pattern::escape(&root.to_string_lossy());
    let mut found = Vec::new();

    for pattern in patterns {
        let full = format!("{}/{}", escaped_root.trim_end_matches('/'), pattern.trim_start_matches("./"));
        let entries = glob::glob(&full).map_err(|e| StageError::Config(format!("invalid glob '{}': {}", pattern, e)))?;
        for path in entries.filter_map(Result::ok) {
            if !strictly_inside(root, &path) || path.starts_with(src) || src.starts_with(&path) {
                continue;
            }
            if !found.contains(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    // a matched directory already covers anything matched inside it
    let mut pruned: Vec<PathBuf> = Vec::with_capacity(found.len());
    for path in found {
        if !pruned.iter().any(|p| path.starts_with(p)) {
            pruned.push(path);
        }
    }
    Ok(pruned)
}

/// True when `path` names something below `root` without leaving it.
fn strictly_inside(root: &Path, path: &Path) -> bool {
    match path.strip_prefix(root) {
        Ok(rel) => rel.components().next().is_some() && rel.components().all(|c| matches!(c, Component::Normal(_))),
        Err(_) => false,
    }
}

impl Stage for CleanStage {
    fn name(&self) -> &str {
        "clean"
    }

    fn description(&self) -> &str {
        "Delete generated output"
    }

    fn run(&self, ctx: &BuildContext) -> Result<StageOutput, StageError> {
        let root = ctx.project_root();
        let src = ctx.src_dir();

        let mut output = StageOutput::new();
        for path in targets(root, &src, &ctx.config().clean.paths)? {
            let result = if path.is_dir() { fs::remove_dir_all(&path) } else { fs::remove_file(&path) };
            result.map_err(|e| StageError::io(&path, e))?;
            output.wrote(path);
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    #[test]
    fn test_removes_exactly_the_outputs() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        for rel in ["index.html", "about.html", "img/logo.png", "css/x.css", "js/main.js", "fonts/a.woff"] {
            touch(root, rel);
        }
        for rel in ["src/html/index.html", "src/img/logo.png", "style.css", "webpipe.toml", "node_modules/x/y.js"] {
            touch(root, rel);
        }

        let ctx = BuildContext::new(SiteConfig::with_name("t"), root.to_path_buf());
        let output = CleanStage.run(&ctx).unwrap();

        assert_eq!(output.written.len(), 6);
        assert!(!root.join("index.html").exists());
        assert!(!root.join("img").exists());
        assert!(!root.join("js").exists());
        assert!(root.join("src/html/index.html").exists());
        assert!(root.join("src/img/logo.png").exists());
        assert!(root.join("style.css").exists());
        assert!(root.join("webpipe.toml").exists());
        assert!(root.join("node_modules/x/y.js").exists());
    }

    #[test]
    fn test_never_touches_source_dir() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/html/page.html");

        let mut config = SiteConfig::with_name("t");
        config.clean.paths = vec!["src".to_string(), "src/**/*.html".to_string(), "*".to_string()];
        let ctx = BuildContext::new(config, temp.path().to_path_buf());
        CleanStage.run(&ctx).unwrap();

        assert!(temp.path().join("src/html/page.html").exists());
    }

    #[test]
    fn test_never_leaves_project_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("site");
        touch(&root, "index.html");
        touch(temp.path(), "keep.txt");

        let mut config = SiteConfig::with_name("t");
        config.clean.paths = vec!["..".to_string(), "../*".to_string(), "./../keep.txt".to_string()];
        let ctx = BuildContext::new(config, root.clone());
        let output = CleanStage.run(&ctx).unwrap();

        assert!(output.written.is_empty());
        assert!(temp.path().join("keep.txt").exists());
        assert!(root.join("index.html").exists());
    }

    #[test]
    fn test_nested_matches_collapse() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "js/main.js");
        let targets = targets(temp.path(), &temp.path().join("src"), &["js".to_string(), "js/*.js".to_string()]).unwrap();
        assert_eq!(targets, vec![temp.path().join("js")]);
    }

    #[test]
    fn test_clean_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(SiteConfig::with_name("t"), temp.path().to_path_buf());
        assert!(CleanStage.run(&ctx).unwrap().written.is_empty());
        assert!(CleanStage.run(&ctx).unwrap().written.is_empty());
    }
}
