//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod build;
mod dev;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::build::{BuildContext, ConsoleProgress, JsonProgress, ProgressReporter, TaskGraph};
use crate::config::{load_config, merge_cli_overrides, CliOverrides};
use crate::stages::default_graph;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_UNKNOWN_TASK: u8 = 2;

/// webpipe - Front-end asset pipeline with a live-reloading dev server
#[derive(Parser)]
#[command(name = "webpipe")]
#[command(about = "webpipe - Build Sass, HTML includes, scripts and images, then serve with live reload")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Command to run (defaults to `dev`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to webpipe.toml (default: search upward from the current directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Show per-task start lines and extra detail
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Report progress as one JSON object per line
    #[arg(long, global = true)]
    pub json: bool,

    /// Number of tasks to run in parallel (default: number of CPUs)
    #[arg(short, long, global = true, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: Option<u16>,

    /// Treat recoverable transform failures as errors
    #[arg(long, global = true)]
    pub strict: bool,

    /// Rebuild images even when outputs are newer than their sources
    #[arg(long, global = true)]
    pub force: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline once
    Build,

    /// Build, then serve the project and rebuild on change
    Dev {
        /// Port for the dev server
        #[arg(short, long)]
        port: Option<u16>,

        /// Show an on-page notice when the browser refreshes
        #[arg(long)]
        notify: bool,

        /// Minify the page script bundle
        #[arg(long)]
        minify: bool,
    },

    /// Delete generated output
    Clean,

    /// Run named tasks and their dependencies
    Run {
        /// Task names (see `webpipe list`)
        #[arg(required = true)]
        tasks: Vec<String>,
    },

    /// List tasks with their dependencies
    List,

    /// Create a new project
    Init {
        /// Directory to create (default: current directory)
        path: Option<PathBuf>,

        /// Project name (default: directory name)
        #[arg(long)]
        name: Option<String>,
    },
}

/// A loaded project: its build context and task graph.
pub(crate) struct Project {
    pub context: BuildContext,
    pub graph: TaskGraph,
}

impl GlobalArgs {
    /// Load the configuration, apply overrides and build the task graph.
    ///
    /// Problems are printed here; the error value is the exit code to use.
    pub(crate) fn load_project(&self, overrides: &CliOverrides) -> Result<Project, ExitCode> {
        let loaded = match load_config(self.config.as_deref()) {
            Ok(loaded) => loaded,
            Err(e) => {
                eprintln!("Error: {}", e);
                return Err(ExitCode::from(EXIT_ERROR));
            }
        };
        if self.verbose {
            match &loaded.path {
                Some(path) => eprintln!("Using config: {}", path.display()),
                None => eprintln!("No webpipe.toml found, using defaults"),
            }
        }

        let mut config = loaded.config;
        merge_cli_overrides(&mut config, overrides);

        let graph = match default_graph(&config) {
            Ok(graph) => graph,
            Err(e) => {
                eprintln!("Error: invalid task configuration: {}", e);
                return Err(ExitCode::from(EXIT_ERROR));
            }
        };

        let context = BuildContext::new(config, loaded.root)
            .with_strict(self.strict)
            .with_verbose(self.verbose)
            .with_force(self.force);
        Ok(Project { context, graph })
    }

    /// The reporter selected by `--json` and `--verbose`.
    pub(crate) fn reporter(&self) -> Box<dyn ProgressReporter> {
        if self.json {
            Box::new(JsonProgress::new())
        } else {
            Box::new(ConsoleProgress::new().with_verbose(self.verbose))
        }
    }

    /// Parallel job count.
    pub(crate) fn jobs(&self) -> usize {
        self.jobs.map(usize::from).unwrap_or_else(crate::build::default_jobs)
    }
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let global = &cli.global;

    match cli.command.unwrap_or(Commands::Dev { port: None, notify: false, minify: false }) {
        Commands::Build => build::run_tasks(global, &["build"]),
        Commands::Dev { port, notify, minify } => dev::run_dev(global, port, notify, minify),
        Commands::Clean => build::run_tasks(global, &["clean"]),
        Commands::Run { tasks } => {
            let tasks: Vec<&str> = tasks.iter().map(String::as_str).collect();
            build::run_tasks(global, &tasks)
        }
        Commands::List => build::run_list(global),
        Commands::Init { path, name } => build::run_init(path.as_deref(), name.as_deref()),
    }
}
