//! Build orchestration for webpipe
//!
//! Provides the task graph and executor that run asset stages.
//!
//! # Overview
//!
//! - **Stages**: named transforms implementing [`Stage`]
//! - **Graph**: tasks (stages and barriers) with dependency edges, validated once
//! - **Execution**: a task's dependency closure runs level by level, independent
//!   tasks in parallel
//!
//! # Example
//!
//! ```ignore
//! use webpipe::build::{BuildContext, ConsoleProgress, Executor};
//! use webpipe::config::load_config;
//!
//! let loaded = load_config(None)?;
//! let context = BuildContext::new(loaded.config, loaded.root);
//! let graph = webpipe::stages::default_graph(context.config())?;
//!
//! let result = Executor::new(&graph, &context, &ConsoleProgress::new()).run("build")?;
//! println!("{}", result.summary());
//! ```

pub mod context;
pub mod executor;
pub mod graph;
pub mod progress;
pub mod result;
pub mod stage;

pub use context::*;
pub use executor::*;
pub use graph::*;
pub use progress::*;
pub use result::*;
pub use stage::*;
