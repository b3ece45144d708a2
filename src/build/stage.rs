//! The stage contract shared by every asset transform.

use crate::build::BuildContext;
use crate::fileset::FileSetError;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A fatal stage error. The task is marked fatal and its dependents blocked.
///
/// Per-file transform problems are not errors at this level; they are
/// collected as [`TransformFailure`]s in the [`StageOutput`].
#[derive(Debug, Error)]
pub enum StageError {
    /// Filesystem error reading or writing a file
    #[error("{}: {source}", path.display())]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// A required input does not exist
    #[error("missing source file: {}", .0.display())]
    MissingSource(PathBuf),
    /// HTML includes form a cycle
    #[error("include cycle: {}", .0.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" -> "))]
    IncludeCycle(Vec<PathBuf>),
    /// A file set could not be resolved
    #[error(transparent)]
    FileSet(#[from] FileSetError),
    /// Stage settings that cannot be applied
    #[error("invalid setting: {0}")]
    Config(String),
}

impl StageError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StageError::Io { path: path.into(), source }
    }
}

/// A recoverable per-file transform failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformFailure {
    /// Source file that failed
    pub file: PathBuf,
    /// Transformer diagnostic
    pub message: String,
}

impl std::fmt::Display for TransformFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.file.display(), self.message)
    }
}

/// What a stage run produced.
#[derive(Debug, Clone, Default)]
pub struct StageOutput {
    /// Files written (or removed, for `clean`)
    pub written: Vec<PathBuf>,
    /// Files skipped because the destination was already up to date
    pub up_to_date: Vec<PathBuf>,
    /// Non-fatal notices
    pub warnings: Vec<String>,
    /// Recoverable per-file failures
    pub failures: Vec<TransformFailure>,
}

impl StageOutput {
    /// Create an empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a written file.
    pub fn wrote(&mut self, path: impl Into<PathBuf>) {
        self.written.push(path.into());
    }

    /// Record a file left untouched because it is current.
    pub fn skipped(&mut self, path: impl Into<PathBuf>) {
        self.up_to_date.push(path.into());
    }

    /// Record a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Record a recoverable failure for one file.
    pub fn fail(&mut self, file: impl Into<PathBuf>, message: impl Into<String>) {
        self.failures.push(TransformFailure { file: file.into(), message: message.into() });
    }

    /// Fold another output into this one.
    pub fn merge(&mut self, other: StageOutput) {
        self.written.extend(other.written);
        self.up_to_date.extend(other.up_to_date);
        self.warnings.extend(other.warnings);
        self.failures.extend(other.failures);
    }
}

/// A named asset transform.
///
/// Stages are stateless apart from their settings, so the same instance may
/// be run repeatedly by the watcher.
pub trait Stage: Send + Sync {
    /// Unique task name (e.g. "sass")
    fn name(&self) -> &str;

    /// One-line description shown by `webpipe list`
    fn description(&self) -> &str;

    /// Run the transform over its inputs.
    fn run(&self, ctx: &BuildContext) -> Result<StageOutput, StageError>;
}

/// Read a file as UTF-8 text.
pub fn read_text(path: &Path) -> Result<String, StageError> {
    fs::read_to_string(path).map_err(|e| StageError::io(path, e))
}

/// Write a file, creating its parent directories.
pub fn write_output(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), StageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StageError::io(parent, e))?;
    }
    fs::write(path, contents).map_err(|e| StageError::io(path, e))
}

/// Replace the extension of a relative output path.
pub fn with_extension(relative: &Path, ext: &str) -> PathBuf {
    let mut path = relative.to_path_buf();
    path.set_extension(ext);
    path
}
