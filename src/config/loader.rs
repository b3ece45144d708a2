//! Configuration loading and discovery for `webpipe.toml`
//!
//! Provides functions to find, load, and merge configuration.

use super::schema::SiteConfig;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the project configuration file
pub const CONFIG_FILE: &str = "webpipe.toml";

/// Configuration loading error
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error
    #[error("Failed to parse webpipe.toml: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error
    #[error("Config validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Validation(Vec<String>),
}

/// CLI arguments that can override config values
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    /// Override the dev server port
    pub port: Option<u16>,
    /// Override script minification
    pub minify_scripts: Option<bool>,
    /// Override on-page reload notifications
    pub notify: Option<bool>,
}

/// A configuration together with the directory it applies to.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Parsed and validated configuration
    pub config: SiteConfig,
    /// Directory containing `webpipe.toml`, or the working directory when
    /// running on defaults
    pub root: PathBuf,
    /// The file the configuration came from, if any
    pub path: Option<PathBuf>,
}

/// Find webpipe.toml by walking up from the current working directory.
pub fn find_config() -> Option<PathBuf> {
    env::current_dir().ok().and_then(find_config_from)
}

/// Find webpipe.toml by walking up from a specific directory.
pub fn find_config_from(start: PathBuf) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let config_path = current.join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            return None;
        }
    }
}

/// Load configuration from a webpipe.toml file.
///
/// If a path is provided, loads from that file. Otherwise, uses `find_config()`
/// to locate the config file. If no config file is found, the built-in
/// defaults apply to the current working directory.
pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    match config_path {
        Some(p) => {
            let config = load_config_file(&p)?;
            // Watch events carry absolute paths, so the root must be absolute too.
            let root = match p.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => fs::canonicalize(parent)?,
                _ => env::current_dir()?,
            };
            Ok(LoadedConfig { config, root, path: Some(p) })
        }
        None => Ok(LoadedConfig { config: default_config(), root: env::current_dir()?, path: None }),
    }
}

/// Load configuration from a specific file path.
fn load_config_file(path: &Path) -> Result<SiteConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: SiteConfig = toml::from_str(&contents)?;

    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors.into_iter().map(|e| e.to_string()).collect()));
    }

    Ok(config)
}

/// Create a default configuration when no webpipe.toml is found.
///
/// The project name is the current directory name.
pub fn default_config() -> SiteConfig {
    let project_name = env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unnamed".to_string());

    SiteConfig::with_name(project_name)
}

/// Merge CLI overrides into a configuration.
///
/// CLI arguments take precedence over config file values.
pub fn merge_cli_overrides(config: &mut SiteConfig, overrides: &CliOverrides) {
    if let Some(port) = overrides.port {
        config.serve.port = port;
    }
    if let Some(minify) = overrides.minify_scripts {
        config.scripts.minify = minify;
    }
    if let Some(notify) = overrides.notify {
        config.serve.notify = notify;
    }
}

/// Resolve a path relative to the project root.
///
/// If the path is absolute, returns it unchanged.
/// If relative, joins it with the project root.
pub fn resolve_path(project_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_root.join(path)
    }
}
