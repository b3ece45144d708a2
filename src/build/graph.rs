//! Task dependency graph.
//!
//! Tasks are stages or barriers (named aggregates with no action). The graph
//! is validated once at construction: duplicate names, dependencies on
//! unknown tasks and cycles are all rejected before anything runs.

use crate::build::Stage;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

/// Error constructing or querying the task graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// Two tasks share a name
    #[error("duplicate task '{0}'")]
    DuplicateTask(String),
    /// A task depends on a name that is not in the graph
    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency {
        /// The dependent task
        task: String,
        /// The missing dependency
        dependency: String,
    },
    /// Dependencies form a cycle
    #[error("circular dependency: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    /// Lookup of a task that does not exist
    #[error("unknown task '{0}'")]
    UnknownTask(String),
}

/// What running a task does.
#[derive(Clone)]
pub enum TaskAction {
    /// Run an asset stage
    Stage(Arc<dyn Stage>),
    /// Aggregate: completes once its dependencies complete
    Barrier,
}

impl std::fmt::Debug for TaskAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskAction::Stage(stage) => write!(f, "Stage({})", stage.name()),
            TaskAction::Barrier => write!(f, "Barrier"),
        }
    }
}

/// A named node of the task graph.
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique task name
    pub name: String,
    /// Short description
    pub description: String,
    /// Tasks that must complete first
    pub dependencies: Vec<String>,
    /// What the task does
    pub action: TaskAction,
}

impl Task {
    /// A task running a stage, named after it.
    pub fn stage(stage: Arc<dyn Stage>) -> Self {
        Self {
            name: stage.name().to_string(),
            description: stage.description().to_string(),
            dependencies: vec![],
            action: TaskAction::Stage(stage),
        }
    }

    /// An aggregate task.
    pub fn barrier<I, S>(name: &str, description: &str, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            action: TaskAction::Barrier,
        }
    }

    /// Set the dependencies.
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the task has no action of its own.
    pub fn is_barrier(&self) -> bool {
        matches!(self.action, TaskAction::Barrier)
    }
}

/// A validated, immutable task graph.
#[derive(Debug)]
pub struct TaskGraph {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
}

impl TaskGraph {
    /// Build and validate a graph.
    pub fn new(tasks: Vec<Task>) -> Result<Self, GraphError> {
        let mut index = HashMap::new();
        for (i, task) in tasks.iter().enumerate() {
            if index.insert(task.name.clone(), i).is_some() {
                return Err(GraphError::DuplicateTask(task.name.clone()));
            }
        }

        for task in &tasks {
            for dep in &task.dependencies {
                if !index.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        task: task.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let graph = Self { tasks, index };
        graph.build_order()?;
        Ok(graph)
    }

    /// Get a task by name.
    pub fn get(&self, name: &str) -> Option<&Task> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    /// Whether a task exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All tasks in declaration order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Task names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    /// All tasks with dependencies before dependents.
    pub fn build_order(&self) -> Result<Vec<&Task>, GraphError> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut path = Vec::new();

        for task in &self.tasks {
            self.visit(task, &mut visited, &mut path, &mut result)?;
        }

        Ok(result)
    }

    /// The tasks needed to run `roots`, dependencies first.
    pub fn closure(&self, roots: &[&str]) -> Result<Vec<&Task>, GraphError> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        let mut path = Vec::new();

        for root in roots {
            let task = self.get(root).ok_or_else(|| GraphError::UnknownTask(root.to_string()))?;
            self.visit(task, &mut visited, &mut path, &mut result)?;
        }

        Ok(result)
    }

    /// The closure of `roots` grouped into levels.
    ///
    /// Every task's dependencies are in strictly earlier levels, so tasks of
    /// one level may run concurrently. Within a level, tasks keep closure
    /// order.
    pub fn levels(&self, roots: &[&str]) -> Result<Vec<Vec<&Task>>, GraphError> {
        let order = self.closure(roots)?;
        let mut depth: HashMap<&str, usize> = HashMap::new();
        let mut levels: Vec<Vec<&Task>> = Vec::new();

        for task in order {
            // closure order guarantees every dependency already has a depth
            let level = task
                .dependencies
                .iter()
                .filter_map(|d| depth.get(d.as_str()))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            depth.insert(task.name.as_str(), level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(task);
        }

        Ok(levels)
    }

    fn visit<'a>(
        &'a self,
        task: &'a Task,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        result: &mut Vec<&'a Task>,
    ) -> Result<(), GraphError> {
        if visited.contains(task.name.as_str()) {
            return Ok(());
        }

        if let Some(pos) = path.iter().position(|n| *n == task.name) {
            let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(task.name.clone());
            return Err(GraphError::Cycle(cycle));
        }

        path.push(task.name.as_str());
        for dep in &task.dependencies {
            if let Some(dep_task) = self.get(dep) {
                self.visit(dep_task, visited, path, result)?;
            }
        }
        path.pop();

        visited.insert(task.name.as_str());
        result.push(task);
        Ok(())
    }
}
