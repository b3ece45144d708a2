//! Configuration module for the webpipe build system
//!
//! Provides types and parsing for `webpipe.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::{
    default_config, find_config, find_config_from, load_config, merge_cli_overrides, resolve_path,
    CliOverrides, ConfigError, LoadedConfig, CONFIG_FILE,
};
pub use schema::*;
