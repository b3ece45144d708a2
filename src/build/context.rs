//! Build context containing configuration and state for a build.

use crate::config::SiteConfig;
use std::path::{Path, PathBuf};

/// Build context containing configuration and paths for a build operation.
///
/// Shared read-only by every stage of a run, including concurrently running
/// ones.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// The loaded configuration
    config: SiteConfig,
    /// Project root directory (where webpipe.toml is located)
    project_root: PathBuf,
    /// Whether recoverable transform failures fail the run
    strict: bool,
    /// Whether to run in verbose mode
    verbose: bool,
    /// Whether to ignore skip-if-newer checks
    force: bool,
}

impl BuildContext {
    /// Create a new build context.
    pub fn new(config: SiteConfig, project_root: PathBuf) -> Self {
        Self { config, project_root, strict: false, verbose: false, force: false }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Get the source directory (resolved to absolute path).
    pub fn src_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.src)
    }

    /// Whether strict mode is enabled.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Whether verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Whether outputs are rewritten even when up to date.
    pub fn is_forced(&self) -> bool {
        self.force
    }

    /// Set strict mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set force mode.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    /// If relative, joins it with the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        crate::config::resolve_path(&self.project_root, path)
    }

    /// Express an absolute path relative to the project root, for messages.
    pub fn display_path<'a>(&self, path: &'a Path) -> std::borrow::Cow<'a, str> {
        path.strip_prefix(&self.project_root).unwrap_or(path).to_string_lossy()
    }
}
