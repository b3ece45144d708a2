//! Watch mode for the dev server
//!
//! Source changes are debounced, matched against the configured watch
//! bindings and dispatched one batch at a time: each matching binding re-runs
//! its tasks, then connected browsers get a CSS/image injection or a full
//! reload.

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::Duration;
use thiserror::Error;

use crate::build::{BuildContext, BuildResult, ExecError, Executor, ProgressReporter, TaskGraph};
use crate::config::{ReloadMode, WatchBinding};
use crate::serve::{ReloadEvent, ReloadHub};

/// Error during watch mode
#[derive(Debug, Error)]
pub enum WatchError {
    /// Failed to initialize file watcher
    #[error("failed to initialize file watcher: {0}")]
    WatcherInit(#[source] notify::Error),
    /// Failed to add watch path
    #[error("failed to watch path: {0}")]
    WatchPath(#[source] notify::Error),
    /// Channel receive error
    #[error("watch channel error: {0}")]
    Channel(String),
    /// Source directory not found
    #[error("source directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    /// A binding names a task that does not exist
    #[error("watch binding '{binding}' runs unknown task '{task}'")]
    UnknownTask {
        /// Binding name
        binding: String,
        /// Missing task
        task: String,
    },
    /// Running a binding's tasks failed before any task ran
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Extensions a browser can swap in place without reloading.
const INJECTABLE: [&str; 8] = ["css", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico"];

/// The outcome of one binding reacting to a change.
#[derive(Debug)]
pub struct Dispatch {
    /// Binding that matched
    pub binding: String,
    /// Result of re-running its tasks
    pub result: BuildResult,
    /// What browsers should do, if anything changed on disk
    pub event: Option<ReloadEvent>,
}

/// Decide what browsers receive after a rebuild.
///
/// Nothing is pushed when nothing was written. Source maps never force a
/// reload by themselves.
pub fn reload_event(mode: ReloadMode, written: &[&PathBuf], root: &Path) -> Option<ReloadEvent> {
    let urls: Vec<(String, bool)> = written
        .iter()
        .filter(|p| p.extension().map(|e| e != "map").unwrap_or(true))
        .map(|p| {
            let rel = p.strip_prefix(root).unwrap_or(p);
            let url = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
            let injectable = p
                .extension()
                .map(|e| INJECTABLE.contains(&e.to_string_lossy().to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            (format!("/{}", url), injectable)
        })
        .collect();

    if urls.is_empty() {
        return None;
    }
    match mode {
        ReloadMode::Auto if urls.iter().all(|(_, injectable)| *injectable) => {
            Some(ReloadEvent::Inject(urls.into_iter().map(|(url, _)| url).collect()))
        }
        _ => Some(ReloadEvent::Reload),
    }
}

/// Maps source changes to task runs.
pub struct WatchDispatcher<'a> {
    executor: Executor<'a>,
    context: &'a BuildContext,
}

impl<'a> WatchDispatcher<'a> {
    /// Create a dispatcher, checking every binding against the graph.
    pub fn new(
        graph: &'a TaskGraph,
        context: &'a BuildContext,
        reporter: &'a dyn ProgressReporter,
        jobs: usize,
    ) -> Result<Self, WatchError> {
        for binding in &context.config().watch.bindings {
            if let Some(task) = binding.tasks.iter().find(|t| !graph.contains(t)) {
                return Err(WatchError::UnknownTask { binding: binding.name.clone(), task: task.clone() });
            }
        }
        Ok(Self { executor: Executor::new(graph, context, reporter).with_jobs(jobs), context })
    }

    /// Bindings with at least one changed file, in configuration order.
    pub fn matching(&self, changed: &[PathBuf]) -> Vec<&WatchBinding> {
        let root = self.context.project_root();
        self.context
            .config()
            .watch
            .bindings
            .iter()
            .filter(|b| {
                changed
                    .iter()
                    .any(|path| b.files.matches(root, path) || b.files.matches(root, &canonical_event_path(path)))
            })
            .collect()
    }

    /// Re-run the tasks of every binding matching `changed`.
    pub fn dispatch(&self, changed: &[PathBuf]) -> Result<Vec<Dispatch>, WatchError> {
        let root = self.context.project_root();
        let mut dispatches = Vec::new();

        for binding in self.matching(changed) {
            let tasks: Vec<&str> = binding.tasks.iter().map(String::as_str).collect();
            let result = self.executor.run_many(&tasks)?;
            let event = reload_event(binding.reload, &result.all_written(), root);
            dispatches.push(Dispatch { binding: binding.name.clone(), result, event });
        }

        Ok(dispatches)
    }
}

/// Resolve symlinks and relative segments in an event path.
///
/// Removed files no longer exist, so only their directory is resolved.
fn canonical_event_path(path: &Path) -> PathBuf {
    if let Ok(path) = path.canonicalize() {
        return path;
    }
    match (path.parent().and_then(|p| p.canonicalize().ok()), path.file_name()) {
        (Some(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

/// Tracks files with errors across rebuilds to announce fixes
#[derive(Debug, Default)]
pub struct ErrorTracker {
    /// Files that failed in the previous run of each binding
    failing: HashSet<(String, PathBuf)>,
}

impl ErrorTracker {
    /// Create a new error tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with a binding's latest result, returns the files it fixed
    pub fn update(&mut self, binding: &str, result: &BuildResult) -> Vec<PathBuf> {
        let current: HashSet<(String, PathBuf)> = result
            .tasks
            .iter()
            .flat_map(|t| t.failures.iter().map(|f| (binding.to_string(), f.file.clone())))
            .collect();

        let fixed: Vec<PathBuf> = self
            .failing
            .iter()
            .filter(|(b, _)| b == binding)
            .filter(|entry| !current.contains(*entry))
            .map(|(_, file)| file.clone())
            .collect();

        self.failing.retain(|(b, _)| b != binding);
        self.failing.extend(current);
        fixed
    }

    /// Check if there are any tracked errors
    pub fn has_errors(&self) -> bool {
        !self.failing.is_empty()
    }
}

/// Clear the terminal screen
fn clear_screen() {
    // ANSI escape code to clear screen and move cursor to top-left
    print!("\x1B[2J\x1B[1;1H");
}

/// Current local wall-clock time for log lines
pub fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Watch the source directory and dispatch changes until interrupted.
///
/// Batches are handled strictly one after another, so a slow transform
/// delays the next batch. Task failures are reported and watching goes on.
pub fn watch(dispatcher: &WatchDispatcher, hub: &ReloadHub) -> Result<(), WatchError> {
    let context = dispatcher.context;
    let src_dir = context.src_dir();
    if !src_dir.exists() {
        return Err(WatchError::SourceNotFound(src_dir));
    }
    let config = &context.config().watch;

    let (tx, rx) = channel();
    let debounce = Duration::from_millis(u64::from(config.debounce_ms));
    let mut debouncer = new_debouncer(debounce, tx).map_err(WatchError::WatcherInit)?;
    debouncer.watcher().watch(&src_dir, RecursiveMode::Recursive).map_err(WatchError::WatchPath)?;

    let mut tracker = ErrorTracker::new();
    println!("[{}] Watching {} for changes...", timestamp(), context.display_path(&src_dir));

    loop {
        let events = match rx.recv() {
            Ok(Ok(events)) => events,
            Ok(Err(error)) => {
                // non-fatal, keep watching
                eprintln!("[{}] Watch error: {:?}", timestamp(), error);
                continue;
            }
            Err(e) => return Err(WatchError::Channel(e.to_string())),
        };

        let mut changed: Vec<PathBuf> = Vec::new();
        for event in events.iter().filter(|e| matches!(e.kind, DebouncedEventKind::Any)) {
            if !changed.contains(&event.path) {
                changed.push(event.path.clone());
            }
        }
        if dispatcher.matching(&changed).is_empty() {
            continue;
        }

        if config.clear_screen {
            clear_screen();
        }
        for path in &changed {
            println!("[{}] Changed: {}", timestamp(), context.display_path(path));
        }

        let dispatches = match dispatcher.dispatch(&changed) {
            Ok(dispatches) => dispatches,
            Err(e) => {
                eprintln!("[{}] {}", timestamp(), e);
                continue;
            }
        };

        for dispatch in dispatches {
            for fixed in tracker.update(&dispatch.binding, &dispatch.result) {
                println!("[{}] Fixed: {}", timestamp(), context.display_path(&fixed));
            }
            match dispatch.event {
                Some(ReloadEvent::Inject(urls)) => {
                    println!("[{}] Injecting {}", timestamp(), urls.join(", "));
                    hub.send(ReloadEvent::Inject(urls));
                }
                Some(ReloadEvent::Reload) => {
                    println!("[{}] Reloading browsers", timestamp());
                    hub.send(ReloadEvent::Reload);
                }
                None => {}
            }
        }
    }
}
