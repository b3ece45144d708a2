//! Task execution.
//!
//! The executor runs a task's dependency closure level by level. Tasks of
//! one level are independent and run on a pool of scoped worker threads; the
//! next level starts once the whole level has finished.
//!
//! A task that fails fatally blocks everything depending on it, directly or
//! through barriers. Recoverable transform failures do not block.
//!
//! # Example
//!
//! ```ignore
//! use webpipe::build::{BuildContext, Executor, NullProgress};
//!
//! let graph = webpipe::stages::default_graph(ctx.config())?;
//! let result = Executor::new(&graph, &ctx, &NullProgress).with_jobs(4).run("build")?;
//! println!("{}", result.summary());
//! ```

use crate::build::{
    BuildContext, BuildResult, GraphError, ProgressEvent, ProgressReporter, Stage, TaskAction,
    TaskGraph, TaskResult,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;
use thiserror::Error;

/// Error before any task runs.
#[derive(Debug, Error)]
pub enum ExecError {
    /// A requested task is not in the graph
    #[error("unknown task '{0}'")]
    UnknownTask(String),
    /// The graph could not be ordered
    #[error(transparent)]
    Graph(GraphError),
}

impl From<GraphError> for ExecError {
    fn from(e: GraphError) -> Self {
        match e {
            GraphError::UnknownTask(name) => ExecError::UnknownTask(name),
            other => ExecError::Graph(other),
        }
    }
}

/// Default number of parallel jobs (uses available parallelism).
pub fn default_jobs() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Runs tasks of a [`TaskGraph`].
pub struct Executor<'a> {
    graph: &'a TaskGraph,
    context: &'a BuildContext,
    reporter: &'a dyn ProgressReporter,
    jobs: usize,
}

impl<'a> Executor<'a> {
    /// Create an executor using all available cores.
    pub fn new(graph: &'a TaskGraph, context: &'a BuildContext, reporter: &'a dyn ProgressReporter) -> Self {
        Self { graph, context, reporter, jobs: default_jobs() }
    }

    /// Set the number of parallel jobs.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Get the number of parallel jobs.
    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Run one task and everything it depends on.
    pub fn run(&self, task: &str) -> Result<BuildResult, ExecError> {
        self.run_many(&[task])
    }

    /// Run several tasks (and their dependencies) as one run.
    pub fn run_many(&self, tasks: &[&str]) -> Result<BuildResult, ExecError> {
        let start = Instant::now();
        let levels = self.graph.levels(tasks)?;

        let total = levels.iter().flatten().filter(|t| !t.is_barrier()).count();
        self.reporter.report(ProgressEvent::BuildStarted { total_tasks: total });

        let mut result = BuildResult::new();
        let mut broken: HashSet<&str> = HashSet::new();

        for level in levels {
            let mut runnable: Vec<&dyn Stage> = Vec::new();

            for task in level {
                let failed_dep = task.dependencies.iter().find(|d| broken.contains(d.as_str()));
                match (&task.action, failed_dep) {
                    (TaskAction::Barrier, Some(_)) => {
                        broken.insert(task.name.as_str());
                    }
                    (TaskAction::Barrier, None) => {}
                    (TaskAction::Stage(_), Some(dep)) => {
                        broken.insert(task.name.as_str());
                        let blocked = TaskResult::blocked(task.name.clone(), dep);
                        self.report_result(&blocked);
                        result.add_result(blocked);
                    }
                    (TaskAction::Stage(stage), None) => runnable.push(stage.as_ref()),
                }
            }

            for task_result in self.execute_level(&runnable) {
                if task_result.status.is_fatal() {
                    if let Some(task) = self.graph.get(&task_result.task) {
                        broken.insert(task.name.as_str());
                    }
                }
                result.add_result(task_result);
            }
        }

        result.total_duration = start.elapsed();
        self.reporter.report(ProgressEvent::BuildCompleted {
            success: result.is_success(),
            duration_ms: result.total_duration.as_millis() as u64,
            succeeded: result.success_count(),
            up_to_date: result.up_to_date_count(),
            failed: result.failed_count() + result.fatal_count(),
        });

        Ok(result)
    }

    /// Execute independent stages, in parallel when allowed.
    ///
    /// Results come back in the order the stages were given.
    fn execute_level(&self, stages: &[&dyn Stage]) -> Vec<TaskResult> {
        if self.jobs == 1 || stages.len() <= 1 {
            return stages.iter().map(|s| self.execute_stage(*s)).collect();
        }

        let results = Mutex::new(Vec::with_capacity(stages.len()));
        let next_idx = AtomicUsize::new(0);

        std::thread::scope(|s| {
            for _ in 0..self.jobs.min(stages.len()) {
                s.spawn(|| loop {
                    let idx = next_idx.fetch_add(1, Ordering::SeqCst);
                    if idx >= stages.len() {
                        break;
                    }
                    let result = self.execute_stage(stages[idx]);
                    results.lock().unwrap_or_else(PoisonError::into_inner).push((idx, result));
                });
            }
        });

        let mut results = results.into_inner().unwrap_or_else(PoisonError::into_inner);
        results.sort_by_key(|(idx, _)| *idx);
        results.into_iter().map(|(_, r)| r).collect()
    }

    fn execute_stage(&self, stage: &dyn Stage) -> TaskResult {
        let name = stage.name().to_string();
        self.reporter.report(ProgressEvent::TaskStarted { task: name.clone() });

        let start = Instant::now();
        let result = match stage.run(self.context) {
            Ok(output) => TaskResult::from_output(name, output, start.elapsed()),
            Err(e) => TaskResult::fatal(name, e.to_string(), start.elapsed()),
        };

        self.report_result(&result);
        result
    }

    fn report_result(&self, result: &TaskResult) {
        for warning in &result.warnings {
            self.reporter
                .report(ProgressEvent::Warning { task: Some(result.task.clone()), message: warning.clone() });
        }
        for failure in &result.failures {
            self.reporter.report(ProgressEvent::TransformFailed {
                task: result.task.clone(),
                file: failure.file.clone(),
                message: failure.message.clone(),
            });
        }
        self.reporter.report(ProgressEvent::TaskCompleted {
            task: result.task.clone(),
            status: result.status.clone(),
            written: result.written.len(),
            duration_ms: result.duration.as_millis() as u64,
        });
    }
}

/// Whether a finished run should make the process fail.
///
/// Fatal and blocked tasks always do; recoverable failures only in strict
/// mode.
pub fn run_failed(result: &BuildResult, strict: bool) -> bool {
    result.has_fatal() || (strict && result.failed_count() > 0)
}
