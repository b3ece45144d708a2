//! Build progress reporting.
//!
//! Every user-visible line of a run goes through a [`ProgressReporter`]:
//! task lifecycle, warnings, and the failure alerts that ring the terminal
//! bell. Console output is colored when stderr is a terminal; `--json`
//! switches to one JSON object per line.

use crate::build::TaskStatus;
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Events that can be reported during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Run started
    BuildStarted {
        /// Number of stage tasks about to run
        total_tasks: usize,
    },
    /// A task started
    TaskStarted {
        /// Task name
        task: String,
    },
    /// A task completed
    TaskCompleted {
        /// Task name
        task: String,
        /// Final status
        status: TaskStatus,
        /// Files written
        written: usize,
        /// Duration in milliseconds
        duration_ms: u64,
    },
    /// One file failed to transform
    TransformFailed {
        /// Task name
        task: String,
        /// Offending source file
        file: PathBuf,
        /// Transformer diagnostic
        message: String,
    },
    /// Run completed
    BuildCompleted {
        /// Whether every task succeeded
        success: bool,
        /// Total duration in milliseconds
        duration_ms: u64,
        /// Tasks that wrote output
        succeeded: usize,
        /// Tasks already up to date
        up_to_date: usize,
        /// Tasks that failed, fatally or not, or were blocked
        failed: usize,
    },
    /// A warning was generated
    Warning {
        /// Task that generated the warning (if applicable)
        task: Option<String>,
        /// Warning message
        message: String,
    },
    /// An error occurred
    Error {
        /// Task that generated the error (if applicable)
        task: Option<String>,
        /// Error message
        message: String,
    },
}

/// Trait for progress reporters.
pub trait ProgressReporter: Send + Sync {
    /// Report a progress event.
    fn report(&self, event: ProgressEvent);

    /// Check if this reporter wants verbose output.
    fn is_verbose(&self) -> bool {
        false
    }
}

/// A progress reporter that discards all events.
#[derive(Debug, Default)]
pub struct NullProgress;

impl NullProgress {
    /// Create a new null progress reporter.
    pub fn new() -> Self {
        Self
    }
}

impl ProgressReporter for NullProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Console progress reporter with optional colors.
pub struct ConsoleProgress {
    /// Whether to use colors
    use_colors: bool,
    /// Whether to show verbose output
    verbose: bool,
    /// Whether failures ring the terminal bell
    bell: bool,
    /// Completed task count
    current: AtomicUsize,
    /// Total task count
    total: AtomicUsize,
    /// Output writer (for testing)
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for ConsoleProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleProgress")
            .field("use_colors", &self.use_colors)
            .field("verbose", &self.verbose)
            .field("current", &self.current)
            .field("total", &self.total)
            .finish()
    }
}

impl ConsoleProgress {
    /// Create a console reporter on stderr, colored when stderr is a terminal.
    pub fn new() -> Self {
        let tty = atty::is(atty::Stream::Stderr);
        Self {
            use_colors: tty,
            verbose: false,
            bell: tty,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(std::io::stderr())),
        }
    }

    /// Create a console progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self {
            use_colors: false,
            verbose: false,
            bell: false,
            current: AtomicUsize::new(0),
            total: AtomicUsize::new(0),
            output: Mutex::new(Box::new(output)),
        }
    }

    /// Set whether to use colors.
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// Set whether failures ring the terminal bell.
    pub fn with_bell(mut self, bell: bool) -> Self {
        self.bell = bell;
        self
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn color(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{}{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    fn green(&self, text: &str) -> String {
        self.color(text, "\x1b[32m")
    }

    fn yellow(&self, text: &str) -> String {
        self.color(text, "\x1b[33m")
    }

    fn red(&self, text: &str) -> String {
        self.color(text, "\x1b[31m")
    }

    fn cyan(&self, text: &str) -> String {
        self.color(text, "\x1b[36m")
    }

    fn bold(&self, text: &str) -> String {
        self.color(text, "\x1b[1m")
    }

    fn writeln(&self, line: &str) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", line);
        }
    }

    /// Boxed alert for a failed transform, preceded by the bell.
    fn notify_failure(&self, task: &str, file: &str, message: &str) {
        let title = format!(" {} failed: {} ", task, file);
        let width = title.chars().count().max(20);
        let border = "-".repeat(width);

        let mut block = String::new();
        if self.bell {
            block.push('\x07');
        }
        block.push_str(&self.red(&format!("+{}+", border)));
        block.push('\n');
        block.push_str(&self.red(&format!("|{:<width$}|", title, width = width)));
        block.push('\n');
        block.push_str(&self.red(&format!("+{}+", border)));
        for line in message.lines() {
            block.push_str("\n  ");
            block.push_str(line);
        }
        self.writeln(&block);
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BuildStarted { total_tasks } => {
                self.total.store(total_tasks, Ordering::SeqCst);
                self.current.store(0, Ordering::SeqCst);
                if total_tasks > 0 {
                    self.writeln(&format!(
                        "{} Running {} task{}...",
                        self.cyan("[build]"),
                        total_tasks,
                        if total_tasks == 1 { "" } else { "s" }
                    ));
                }
            }
            ProgressEvent::TaskStarted { task } => {
                if self.verbose {
                    self.writeln(&format!("{} Starting '{}'...", self.cyan("[build]"), task));
                }
            }
            ProgressEvent::TaskCompleted { task, status, written, duration_ms } => {
                let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                let total = self.total.load(Ordering::SeqCst);

                let status_str = match &status {
                    TaskStatus::Success => self.green("ok"),
                    TaskStatus::UpToDate => self.yellow("up to date"),
                    TaskStatus::Failed(_) => self.red("FAILED"),
                    TaskStatus::Fatal(_) => self.red("FATAL"),
                    TaskStatus::Blocked(_) => self.yellow("blocked"),
                };

                let files = if written > 0 {
                    format!(", {} file{}", written, if written == 1 { "" } else { "s" })
                } else {
                    String::new()
                };

                self.writeln(&format!(
                    "{} [{}/{}] {} {} ({}{})",
                    self.cyan("[build]"),
                    current,
                    total,
                    status_str,
                    task,
                    format_duration(duration_ms),
                    files
                ));

                match &status {
                    TaskStatus::Fatal(err) => {
                        if self.bell {
                            self.writeln("\x07");
                        }
                        self.writeln(&format!("        {}", self.red(err)));
                    }
                    TaskStatus::Blocked(reason) => self.writeln(&format!("        {}", reason)),
                    _ => {}
                }
            }
            ProgressEvent::TransformFailed { task, file, message } => {
                self.notify_failure(&task, &file.to_string_lossy(), &message);
            }
            ProgressEvent::BuildCompleted { success, duration_ms, succeeded, up_to_date, failed } => {
                let duration_str = format_duration(duration_ms);
                let total = succeeded + up_to_date + failed;

                if success {
                    self.writeln(&format!(
                        "{} {} {} finished, {} up to date in {}",
                        self.green("[done]"),
                        self.bold(&format!("{}", total)),
                        if total == 1 { "task" } else { "tasks" },
                        up_to_date,
                        duration_str
                    ));
                } else {
                    self.writeln(&format!(
                        "{} Build failed: {} succeeded, {} up to date, {} {} in {}",
                        self.red("[error]"),
                        succeeded,
                        up_to_date,
                        failed,
                        if failed == 1 { "failure" } else { "failures" },
                        duration_str
                    ));
                }
            }
            ProgressEvent::Warning { task, message } => {
                let prefix = task.map(|t| format!("{}: ", t)).unwrap_or_default();
                self.writeln(&format!("{} {}{}", self.yellow("[warn]"), prefix, message));
            }
            ProgressEvent::Error { task, message } => {
                let prefix = task.map(|t| format!("{}: ", t)).unwrap_or_default();
                self.writeln(&format!("{} {}{}", self.red("[error]"), prefix, message));
            }
        }
    }

    fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// JSON progress reporter for machine-readable output.
pub struct JsonProgress {
    /// Output writer
    output: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for JsonProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonProgress").finish()
    }
}

impl JsonProgress {
    /// Create a new JSON progress reporter writing to stderr.
    pub fn new() -> Self {
        Self { output: Mutex::new(Box::new(std::io::stderr())) }
    }

    /// Create a JSON progress reporter that writes to a custom output.
    pub fn with_output<W: Write + Send + 'static>(output: W) -> Self {
        Self { output: Mutex::new(Box::new(output)) }
    }

    fn write_json(&self, value: &Value) {
        if let Ok(mut output) = self.output.lock() {
            let _ = writeln!(output, "{}", value);
        }
    }
}

impl Default for JsonProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let value = match event {
            ProgressEvent::BuildStarted { total_tasks } => {
                json!({ "event": "build_started", "total_tasks": total_tasks })
            }
            ProgressEvent::TaskStarted { task } => json!({ "event": "task_started", "task": task }),
            ProgressEvent::TaskCompleted { task, status, written, duration_ms } => {
                let mut value = json!({
                    "event": "task_completed",
                    "task": task,
                    "status": status.label(),
                    "written": written,
                    "duration_ms": duration_ms,
                });
                if let Some(detail) = status.detail() {
                    value["error"] = Value::from(detail);
                }
                value
            }
            ProgressEvent::TransformFailed { task, file, message } => json!({
                "event": "transform_failed",
                "task": task,
                "file": file.to_string_lossy(),
                "message": message,
            }),
            ProgressEvent::BuildCompleted { success, duration_ms, succeeded, up_to_date, failed } => {
                json!({
                    "event": "build_completed",
                    "success": success,
                    "duration_ms": duration_ms,
                    "succeeded": succeeded,
                    "up_to_date": up_to_date,
                    "failed": failed,
                })
            }
            ProgressEvent::Warning { task, message } => {
                json!({ "event": "warning", "task": task, "message": message })
            }
            ProgressEvent::Error { task, message } => {
                json!({ "event": "error", "task": task, "message": message })
            }
        };
        self.write_json(&value);
    }
}

/// Format a duration in milliseconds to a human-readable string.
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let minutes = ms / 60_000;
        let seconds = (ms % 60_000) / 1000;
        format!("{}m {}s", minutes, seconds)
    }
}
