//! webpipe - Front-end asset pipeline
//!
//! This library provides functionality to:
//! - Compile Sass, expand HTML includes and bundle page scripts
//! - Optimize images and generate favicons and SVG sprites
//! - Run the asset stages as a dependency graph, in parallel where possible
//! - Serve the site with live reload while watching sources

pub mod build;
pub mod cli;
pub mod config;
pub mod fileset;
pub mod init;
pub mod serve;
pub mod stages;
pub mod templates;
pub mod watch;
