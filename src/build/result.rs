//! Build result types.
//!
//! Contains types for representing the outcome of task runs.

use crate::build::{StageOutput, TransformFailure};
use std::path::PathBuf;
use std::time::Duration;

/// Status of a single task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task wrote its outputs
    Success,
    /// Every output was already up to date
    UpToDate,
    /// Some files failed to transform; the rest were processed
    Failed(String),
    /// The task could not run to completion
    Fatal(String),
    /// Not run because a dependency failed fatally
    Blocked(String),
}

impl TaskStatus {
    /// Check if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::UpToDate)
    }

    /// Whether dependents must not run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TaskStatus::Fatal(_) | TaskStatus::Blocked(_))
    }

    /// Short machine-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Success => "success",
            TaskStatus::UpToDate => "up_to_date",
            TaskStatus::Failed(_) => "failed",
            TaskStatus::Fatal(_) => "fatal",
            TaskStatus::Blocked(_) => "blocked",
        }
    }

    /// Error detail, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            TaskStatus::Failed(msg) | TaskStatus::Fatal(msg) | TaskStatus::Blocked(msg) => Some(msg),
            TaskStatus::Success | TaskStatus::UpToDate => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}: {}", self.label(), detail),
            None => write!(f, "{}", self.label()),
        }
    }
}

/// Result of running a single task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    /// Task name
    pub task: String,
    /// Final status
    pub status: TaskStatus,
    /// Files written
    pub written: Vec<PathBuf>,
    /// Number of files skipped as up to date
    pub up_to_date: usize,
    /// Warning messages
    pub warnings: Vec<String>,
    /// Recoverable per-file failures
    pub failures: Vec<TransformFailure>,
    /// Run duration
    pub duration: Duration,
}

impl TaskResult {
    /// Build a result from what a stage returned.
    pub fn from_output(task: String, output: StageOutput, duration: Duration) -> Self {
        let status = if !output.failures.is_empty() {
            let n = output.failures.len();
            TaskStatus::Failed(format!("{} file{} failed", n, if n == 1 { "" } else { "s" }))
        } else if output.written.is_empty() && !output.up_to_date.is_empty() {
            TaskStatus::UpToDate
        } else {
            TaskStatus::Success
        };
        Self {
            task,
            status,
            written: output.written,
            up_to_date: output.up_to_date.len(),
            warnings: output.warnings,
            failures: output.failures,
            duration,
        }
    }

    /// Create a fatal result.
    pub fn fatal(task: String, error: String, duration: Duration) -> Self {
        Self::empty(task, TaskStatus::Fatal(error), duration)
    }

    /// Create a blocked result.
    pub fn blocked(task: String, dependency: &str) -> Self {
        Self::empty(task, TaskStatus::Blocked(format!("dependency '{}' failed", dependency)), Duration::ZERO)
    }

    fn empty(task: String, status: TaskStatus, duration: Duration) -> Self {
        Self { task, status, written: vec![], up_to_date: 0, warnings: vec![], failures: vec![], duration }
    }

    /// Check if this result is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Result of a complete run.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Results for each stage task, in completion order per level
    pub tasks: Vec<TaskResult>,
    /// Total duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task result.
    pub fn add_result(&mut self, result: TaskResult) {
        self.tasks.push(result);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    fn count(&self, pred: impl Fn(&TaskStatus) -> bool) -> usize {
        self.tasks.iter().filter(|r| pred(&r.status)).count()
    }

    /// Number of tasks that wrote output.
    pub fn success_count(&self) -> usize {
        self.count(|s| matches!(s, TaskStatus::Success))
    }

    /// Number of tasks that were already up to date.
    pub fn up_to_date_count(&self) -> usize {
        self.count(|s| matches!(s, TaskStatus::UpToDate))
    }

    /// Number of tasks with recoverable failures.
    pub fn failed_count(&self) -> usize {
        self.count(|s| matches!(s, TaskStatus::Failed(_)))
    }

    /// Number of fatal or blocked tasks.
    pub fn fatal_count(&self) -> usize {
        self.count(TaskStatus::is_fatal)
    }

    /// Whether any task failed fatally (or was blocked by one).
    pub fn has_fatal(&self) -> bool {
        self.fatal_count() > 0
    }

    /// Check if every task succeeded.
    pub fn is_success(&self) -> bool {
        self.tasks.iter().all(TaskResult::is_success)
    }

    /// Look up a task's result.
    pub fn get(&self, task: &str) -> Option<&TaskResult> {
        self.tasks.iter().find(|r| r.task == task)
    }

    /// Get all files written.
    pub fn all_written(&self) -> Vec<&PathBuf> {
        self.tasks.iter().flat_map(|r| r.written.iter()).collect()
    }

    /// Get all warnings.
    pub fn all_warnings(&self) -> Vec<&String> {
        self.tasks.iter().flat_map(|r| r.warnings.iter()).collect()
    }

    /// Get unsuccessful task results.
    pub fn failures(&self) -> Vec<&TaskResult> {
        self.tasks.iter().filter(|r| !r.is_success()).collect()
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let success = self.success_count();
        let up_to_date = self.up_to_date_count();
        let total = self.tasks.len();

        if self.is_success() {
            lines.push(format!(
                "Build succeeded: {} built, {} up to date ({} total) in {:?}",
                success, up_to_date, total, self.total_duration
            ));
        } else {
            lines.push(format!(
                "Build failed: {} succeeded, {} up to date, {} failed, {} fatal ({} total)",
                success,
                up_to_date,
                self.failed_count(),
                self.fatal_count(),
                total
            ));
            for task in self.failures() {
                lines.push(format!("  - {}: {}", task.task, task.status));
                for failure in &task.failures {
                    lines.push(format!("      {}", failure));
                }
            }
        }

        let warnings = self.all_warnings();
        if !warnings.is_empty() {
            lines.push(format!("Warnings ({}): ", warnings.len()));
            for warning in warnings.iter().take(5) {
                lines.push(format!("  - {}", warning));
            }
            if warnings.len() > 5 {
                lines.push(format!("  ... and {} more", warnings.len() - 5));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(written: &[&str], skipped: &[&str], failures: usize) -> StageOutput {
        let mut out = StageOutput::new();
        written.iter().for_each(|w| out.wrote(*w));
        skipped.iter().for_each(|s| out.skipped(*s));
        for i in 0..failures {
            out.fail(format!("f{}.scss", i), "syntax error");
        }
        out
    }

    #[test]
    fn test_task_status_display() {
        assert_eq!(TaskStatus::Success.to_string(), "success");
        assert_eq!(TaskStatus::UpToDate.to_string(), "up_to_date");
        assert_eq!(TaskStatus::Fatal("disk full".to_string()).to_string(), "fatal: disk full");
    }

    #[test]
    fn test_task_status_predicates() {
        assert!(TaskStatus::UpToDate.is_success());
        assert!(!TaskStatus::Failed("x".to_string()).is_success());
        assert!(!TaskStatus::Failed("x".to_string()).is_fatal());
        assert!(TaskStatus::Blocked("x".to_string()).is_fatal());
    }

    #[test]
    fn test_from_output_statuses() {
        let ok = TaskResult::from_output("img".into(), output(&["a.png"], &["b.png"], 0), Duration::ZERO);
        assert_eq!(ok.status, TaskStatus::Success);
        assert_eq!(ok.up_to_date, 1);

        let current = TaskResult::from_output("img".into(), output(&[], &["b.png"], 0), Duration::ZERO);
        assert_eq!(current.status, TaskStatus::UpToDate);

        let nothing = TaskResult::from_output("fonts".into(), output(&[], &[], 0), Duration::ZERO);
        assert_eq!(nothing.status, TaskStatus::Success);

        let failed = TaskResult::from_output("sass".into(), output(&["a.css"], &[], 2), Duration::ZERO);
        assert_eq!(failed.status, TaskStatus::Failed("2 files failed".to_string()));
        assert_eq!(failed.written.len(), 1);
    }

    #[test]
    fn test_build_result_counts() {
        let mut result = BuildResult::new();
        result.add_result(TaskResult::from_output("a".into(), output(&["x"], &[], 0), Duration::ZERO));
        result.add_result(TaskResult::from_output("b".into(), output(&[], &["y"], 0), Duration::ZERO));
        result.add_result(TaskResult::from_output("c".into(), output(&[], &[], 1), Duration::ZERO));
        result.add_result(TaskResult::fatal("d".into(), "io".into(), Duration::ZERO));
        result.add_result(TaskResult::blocked("e".into(), "d"));

        assert_eq!(result.success_count(), 1);
        assert_eq!(result.up_to_date_count(), 1);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.fatal_count(), 2);
        assert!(result.has_fatal());
        assert!(!result.is_success());
        assert_eq!(result.all_written().len(), 1);
    }

    #[test]
    fn test_build_result_summary() {
        let mut result = BuildResult::new();
        result.add_result(TaskResult::from_output("sass".into(), output(&["style.css"], &[], 0), Duration::ZERO));
        let summary = result.with_duration(Duration::from_millis(100)).summary();
        assert!(summary.contains("Build succeeded"));
        assert!(summary.contains("1 built"));
    }

    #[test]
    fn test_build_result_summary_lists_failures() {
        let mut result = BuildResult::new();
        result.add_result(TaskResult::from_output("sass".into(), output(&[], &[], 1), Duration::ZERO));
        result.add_result(TaskResult::blocked("purgecss".into(), "html"));

        let summary = result.summary();
        assert!(summary.contains("Build failed"));
        assert!(summary.contains("f0.scss: syntax error"));
        assert!(summary.contains("purgecss: blocked: dependency 'html' failed"));
    }
}
