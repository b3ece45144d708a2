//! Project initialization for webpipe
//!
//! Scaffolds the source layout the default configuration expects.

use crate::templates;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error during project initialization
#[derive(Debug, Error)]
pub enum InitError {
    /// Target directory has content
    #[error("directory is not empty: {}", .0.display())]
    NotEmpty(PathBuf),
    /// Failed to create directory
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        /// Directory being created
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// Failed to write file
    #[error("failed to write {}: {source}", path.display())]
    WriteFile {
        /// File being written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Source directories of the default layout.
const DIRECTORIES: [&str; 5] = ["src/html/inc", "src/sass", "src/js/inc", "src/img/sprite", "src/fonts"];

/// Initialize a new webpipe project.
///
/// Writes the config, `package.json`, `.gitignore` and a starter `src/`
/// tree. Returns the files written, relative to `path`.
///
/// # Example
/// ```ignore
/// init_project(Path::new("landing"), "landing")?;
/// ```
pub fn init_project(path: &Path, name: &str) -> Result<Vec<PathBuf>, InitError> {
    // Check if directory already exists and is not empty
    if path.exists() {
        let is_empty = path.read_dir().map(|mut d| d.next().is_none()).unwrap_or(false);
        if !is_empty {
            return Err(InitError::NotEmpty(path.to_path_buf()));
        }
    }

    for dir in DIRECTORIES {
        create_dir(&path.join(dir))?;
    }

    let files = [
        ("webpipe.toml", templates::generate_config(name)),
        ("package.json", templates::generate_package_json(name)),
        (".gitignore", templates::generate_gitignore()),
        ("src/html/index.html", templates::generate_index_html(name)),
        ("src/html/inc/header.html", templates::generate_header_html()),
        ("src/sass/style.scss", templates::generate_style_scss()),
        ("src/sass/_vars.scss", templates::generate_vars_scss()),
        ("src/js/main.js", templates::PAGE_SCRIPT.to_string()),
        ("src/img/sprite/.gitkeep", String::new()),
        ("src/fonts/.gitkeep", String::new()),
        ("src/js/inc/.gitkeep", String::new()),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (rel, content) in files {
        write_file(&path.join(rel), &content)?;
        written.push(PathBuf::from(rel));
    }
    Ok(written)
}

/// Create a directory and all parent directories.
fn create_dir(path: &Path) -> Result<(), InitError> {
    fs::create_dir_all(path).map_err(|source| InitError::CreateDir { path: path.to_path_buf(), source })
}

/// Write content to a file.
fn write_file(path: &Path, content: &str) -> Result<(), InitError> {
    fs::write(path, content).map_err(|source| InitError::WriteFile { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{BuildContext, Executor, NullProgress};
    use crate::config::load_config;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_structure() {
        let temp = TempDir::new().unwrap();
        let project = temp.path().join("landing");

        let written = init_project(&project, "landing").unwrap();

        assert!(written.contains(&PathBuf::from("webpipe.toml")));
        for dir in DIRECTORIES {
            assert!(project.join(dir).is_dir(), "missing {}", dir);
        }
        let main_js = fs::read_to_string(project.join("src/js/main.js")).unwrap();
        assert_eq!(main_js, templates::PAGE_SCRIPT);
    }

    #[test]
    fn test_init_into_empty_existing_dir() {
        let temp = TempDir::new().unwrap();
        assert!(init_project(temp.path(), "here").is_ok());
    }

    #[test]
    fn test_init_refuses_non_empty_dir() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("keep.txt"), "mine").unwrap();

        let err = init_project(temp.path(), "x").unwrap_err();

        assert!(matches!(err, InitError::NotEmpty(_)));
        assert_eq!(fs::read_to_string(temp.path().join("keep.txt")).unwrap(), "mine");
        assert!(!temp.path().join("webpipe.toml").exists());
    }

    #[test]
    fn test_scaffold_builds_html_and_css() {
        let temp = TempDir::new().unwrap();
        init_project(temp.path(), "landing").unwrap();

        let loaded = load_config(Some(&temp.path().join("webpipe.toml"))).unwrap();
        let ctx = BuildContext::new(loaded.config, loaded.root);
        let graph = crate::stages::default_graph(ctx.config()).unwrap();
        let result = Executor::new(&graph, &ctx, &NullProgress).run_many(&["sass", "html"]).unwrap();

        assert!(result.is_success(), "{}", result.summary());
        let page = fs::read_to_string(temp.path().join("index.html")).unwrap();
        assert!(page.contains(r#"<h1 class="header__title">landing</h1>"#));
        assert!(temp.path().join("style.css").exists());
    }
}
