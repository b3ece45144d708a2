//! Source file sets.
//!
//! A [`FileSet`] is a filesystem selection made of ordered include globs and
//! exclude globs, all relative to the project root. Excludes only ever
//! subtract from the includes of the same set.

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Error while resolving a file set.
#[derive(Debug, Error)]
pub enum FileSetError {
    /// Invalid glob pattern
    #[error("invalid glob pattern '{0}': {1}")]
    InvalidPattern(String, glob::PatternError),
    /// Exclusions without any inclusion to subtract from
    #[error("exclude patterns require at least one include pattern")]
    ExcludeWithoutInclude,
}

const MATCH_OPTIONS: MatchOptions =
    MatchOptions { case_sensitive: true, require_literal_separator: true, require_literal_leading_dot: false };

/// An ordered selection of files relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FileSet {
    /// Glob patterns selecting files, resolved in declaration order
    #[serde(default)]
    pub include: Vec<String>,
    /// Glob patterns removed from the selection
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

/// A file matched by a [`FileSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Path relative to the glob base of the pattern that matched it
    pub relative: PathBuf,
}

impl FileSet {
    /// Create a file set from include patterns.
    pub fn new<I, S>(include: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { include: include.into_iter().map(Into::into).collect(), exclude: vec![] }
    }

    /// Add exclude patterns.
    pub fn excluding<I, S>(mut self, exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(exclude.into_iter().map(Into::into));
        self
    }

    /// Check that all patterns compile and that excludes have includes.
    pub fn validate(&self) -> Result<(), FileSetError> {
        if self.include.is_empty() && !self.exclude.is_empty() {
            return Err(FileSetError::ExcludeWithoutInclude);
        }
        for pattern in self.include.iter().chain(&self.exclude) {
            Pattern::new(pattern).map_err(|e| FileSetError::InvalidPattern(pattern.clone(), e))?;
        }
        Ok(())
    }

    /// Resolve the set against a project root.
    ///
    /// Files come out in include-pattern order, sorted within each pattern.
    /// A file matched by several includes keeps its first position. Patterns
    /// that match nothing contribute nothing.
    pub fn resolve(&self, root: &Path) -> Result<Vec<SourceFile>, FileSetError> {
        let excludes = self.compile_excludes()?;
        let escaped_root = Pattern::escape(&root.to_string_lossy());

        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for pattern in &self.include {
            let full = format!("{}/{}", escaped_root.trim_end_matches('/'), pattern);
            let entries = glob::glob_with(&full, MATCH_OPTIONS)
                .map_err(|e| FileSetError::InvalidPattern(pattern.clone(), e))?;
            let base = glob_base(pattern);

            let mut matched: Vec<PathBuf> = entries.filter_map(Result::ok).filter(|p| p.is_file()).collect();
            matched.sort();

            for path in matched {
                let Ok(rel) = path.strip_prefix(root) else { continue };
                if excludes.iter().any(|p| p.matches_path_with(rel, MATCH_OPTIONS)) {
                    continue;
                }
                if !seen.insert(path.clone()) {
                    continue;
                }
                let relative = rel.strip_prefix(&base).map(Path::to_path_buf).unwrap_or_else(|_| {
                    rel.file_name().map(PathBuf::from).unwrap_or_else(|| rel.to_path_buf())
                });
                files.push(SourceFile { path, relative });
            }
        }

        Ok(files)
    }

    /// Check whether a path (absolute or root-relative) belongs to the set.
    pub fn matches(&self, root: &Path, path: &Path) -> bool {
        let rel = path.strip_prefix(root).unwrap_or(path);
        let included = self
            .include
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .any(|p| p.matches_path_with(rel, MATCH_OPTIONS));
        included
            && !self
                .exclude
                .iter()
                .filter_map(|p| Pattern::new(p).ok())
                .any(|p| p.matches_path_with(rel, MATCH_OPTIONS))
    }

    fn compile_excludes(&self) -> Result<Vec<Pattern>, FileSetError> {
        if self.include.is_empty() && !self.exclude.is_empty() {
            return Err(FileSetError::ExcludeWithoutInclude);
        }
        self.exclude
            .iter()
            .map(|p| Pattern::new(p).map_err(|e| FileSetError::InvalidPattern(p.clone(), e)))
            .collect()
    }
}

/// The literal directory prefix of a glob pattern.
///
/// `src/img/**/*.png` has base `src/img`; a pattern without wildcards has its
/// parent directory as base.
pub fn glob_base(pattern: &str) -> PathBuf {
    let path = Path::new(pattern);
    let mut base = PathBuf::new();
    let components: Vec<Component> = path.components().collect();

    for (i, component) in components.iter().enumerate() {
        let text = component.as_os_str().to_string_lossy();
        if text.contains(['*', '?', '[', '{']) {
            return base;
        }
        if i + 1 == components.len() {
            // last literal component is the file itself
            return base;
        }
        base.push(component);
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    fn relative_names(files: &[SourceFile]) -> Vec<String> {
        files.iter().map(|f| f.relative.to_string_lossy().replace('\\', "/")).collect()
    }

    #[test]
    fn test_glob_base() {
        assert_eq!(glob_base("src/img/**/*.png"), PathBuf::from("src/img"));
        assert_eq!(glob_base("src/html/*.html"), PathBuf::from("src/html"));
        assert_eq!(glob_base("src/js/main.js"), PathBuf::from("src/js"));
        assert_eq!(glob_base("*.html"), PathBuf::new());
    }

    #[test]
    fn test_resolve_respects_include_order() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/js/main.js");
        touch(temp.path(), "src/js/inc/b.js");
        touch(temp.path(), "src/js/inc/a.js");

        let set = FileSet::new(["src/js/inc/**/*.js", "src/js/main.js"]);
        let files = set.resolve(temp.path()).unwrap();

        assert_eq!(relative_names(&files), vec!["a.js", "b.js", "main.js"]);
    }

    #[test]
    fn test_resolve_deduplicates_keeping_first_position() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/js/main.js");
        touch(temp.path(), "src/js/util.js");

        let set = FileSet::new(["src/js/main.js", "src/js/*.js"]);
        let files = set.resolve(temp.path()).unwrap();

        assert_eq!(relative_names(&files), vec!["main.js", "util.js"]);
    }

    #[test]
    fn test_resolve_applies_excludes() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "src/img/logo.png");
        touch(temp.path(), "src/img/favicon.png");
        touch(temp.path(), "src/img/sprite/icon.svg");
        touch(temp.path(), "src/img/photos/cat.jpg");

        let set = FileSet::new(["src/img/**/*.png", "src/img/**/*.jpg", "src/img/**/*.svg"])
            .excluding(["src/img/favicon.png", "src/img/sprite/**"]);
        let files = set.resolve(temp.path()).unwrap();

        assert_eq!(relative_names(&files), vec!["logo.png", "photos/cat.jpg"]);
    }

    #[test]
    fn test_resolve_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let set = FileSet::new(["src/fonts/**/*.woff"]);
        assert!(set.resolve(temp.path()).unwrap().is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_pattern() {
        let set = FileSet::new(["src/[abc"]);
        assert!(matches!(set.validate(), Err(FileSetError::InvalidPattern(_, _))));
    }

    #[test]
    fn test_validate_rejects_exclude_without_include() {
        let set = FileSet::default().excluding(["src/**"]);
        assert!(matches!(set.validate(), Err(FileSetError::ExcludeWithoutInclude)));
    }

    #[test]
    fn test_matches() {
        let root = Path::new("/project");
        let set = FileSet::new(["src/img/**/*.svg"]).excluding(["src/img/sprite/**"]);

        assert!(set.matches(root, Path::new("/project/src/img/logo.svg")));
        assert!(set.matches(root, Path::new("src/img/deep/logo.svg")));
        assert!(!set.matches(root, Path::new("/project/src/img/sprite/icon.svg")));
        assert!(!set.matches(root, Path::new("/project/src/img/logo.png")));
    }
}
