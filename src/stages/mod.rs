//! Asset stages and the default task vocabulary.
//!
//! | task | stage |
//! |------|-------|
//! | `sass` | [`sass::SassStage`] |
//! | `html` | [`html::HtmlStage`] |
//! | `fonts`, `video` | [`copy::CopyStage`] |
//! | `img` | [`images::ImagesStage`] |
//! | `svg` | [`sprite::SpriteStage`] |
//! | `favicon` | [`favicon::FaviconStage`] |
//! | `deps`, `scripts` | [`bundle::DepsStage`], [`bundle::ScriptsStage`] |
//! | `purgecss` | [`purge::PurgeStage`], after `sass`, `html` and `scripts` |
//! | `clean` | [`clean::CleanStage`] |
//!
//! `build` waits for the nine leaf stages, `dev` for `build` and `default`
//! for `dev`. Each `[aggregates]` entry adds one more barrier.

pub mod bundle;
pub mod clean;
pub mod copy;
pub mod css;
pub mod favicon;
pub mod html;
pub mod images;
pub mod purge;
pub mod sass;
pub mod sourcemap;
pub mod sprite;

use crate::build::{GraphError, Task, TaskGraph};
use crate::config::SiteConfig;
use std::sync::Arc;

/// Leaf stages run by `build`, in declaration order.
pub const BUILD_TASKS: [&str; 9] = ["sass", "html", "fonts", "img", "video", "svg", "favicon", "deps", "scripts"];

/// Task run when no command is given.
pub const DEFAULT_TASK: &str = "default";

/// The task graph for a configuration.
///
/// Fails when an aggregate reuses a task name or names an unknown task.
pub fn default_graph(config: &SiteConfig) -> Result<TaskGraph, GraphError> {
    let mut tasks = vec![
        Task::stage(Arc::new(sass::SassStage)),
        Task::stage(Arc::new(html::HtmlStage)),
        Task::stage(Arc::new(copy::CopyStage::fonts())),
        Task::stage(Arc::new(images::ImagesStage)),
        Task::stage(Arc::new(copy::CopyStage::video())),
        Task::stage(Arc::new(sprite::SpriteStage)),
        Task::stage(Arc::new(favicon::FaviconStage)),
        Task::stage(Arc::new(bundle::DepsStage)),
        Task::stage(Arc::new(bundle::ScriptsStage)),
        Task::stage(Arc::new(purge::PurgeStage)).with_dependencies(["sass", "html", "scripts"]),
        Task::stage(Arc::new(clean::CleanStage)),
        Task::barrier("build", "Run every asset stage", BUILD_TASKS),
        Task::barrier("dev", "Build, then serve and watch", ["build"]),
        Task::barrier(DEFAULT_TASK, "Same as dev", ["dev"]),
    ];

    for (name, dependencies) in &config.aggregates {
        tasks.push(Task::barrier(name, "User aggregate", dependencies.iter().cloned()));
    }

    TaskGraph::new(tasks)
}
