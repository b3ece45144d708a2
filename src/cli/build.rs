//! Build command implementations (build, clean, run, list, init)

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::{GlobalArgs, EXIT_ERROR, EXIT_SUCCESS, EXIT_UNKNOWN_TASK};
use crate::build::{run_failed, ExecError, Executor};
use crate::config::CliOverrides;

/// Run tasks (and everything they depend on) once.
pub fn run_tasks(global: &GlobalArgs, tasks: &[&str]) -> ExitCode {
    let project = match global.load_project(&CliOverrides::default()) {
        Ok(project) => project,
        Err(code) => return code,
    };

    if let Some(unknown) = tasks.iter().find(|t| !project.graph.contains(t)) {
        eprintln!("Error: unknown task '{}'", unknown);
        eprintln!("Run 'webpipe list' to see available tasks");
        return ExitCode::from(EXIT_UNKNOWN_TASK);
    }

    let reporter = global.reporter();
    let executor = Executor::new(&project.graph, &project.context, reporter.as_ref()).with_jobs(global.jobs());

    match executor.run_many(tasks) {
        Ok(result) => {
            if run_failed(&result, project.context.is_strict()) {
                ExitCode::from(EXIT_ERROR)
            } else {
                ExitCode::from(EXIT_SUCCESS)
            }
        }
        Err(ExecError::UnknownTask(name)) => {
            eprintln!("Error: unknown task '{}'", name);
            ExitCode::from(EXIT_UNKNOWN_TASK)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the list command
pub fn run_list(global: &GlobalArgs) -> ExitCode {
    let project = match global.load_project(&CliOverrides::default()) {
        Ok(project) => project,
        Err(code) => return code,
    };
    let tasks = project.graph.tasks();

    if global.json {
        let listing: Vec<serde_json::Value> = tasks
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "dependencies": t.dependencies,
                    "barrier": t.is_barrier(),
                })
            })
            .collect();
        match serde_json::to_string_pretty(&listing) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        }
        return ExitCode::from(EXIT_SUCCESS);
    }

    let width = tasks.iter().map(|t| t.name.len()).max().unwrap_or(0);
    for task in tasks {
        println!("{:<width$}  {}", task.name, task.description, width = width);
        if !task.dependencies.is_empty() {
            println!("{:<width$}  depends on: {}", "", task.dependencies.join(", "), width = width);
        }
    }
    ExitCode::from(EXIT_SUCCESS)
}

/// Run the init command
pub fn run_init(path: Option<&Path>, name: Option<&str>) -> ExitCode {
    use crate::init::{init_project, InitError};

    // Determine project path
    let project_path = match path {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };

    // Determine project name
    let project_name = name
        .map(|n| n.to_string())
        .or_else(|| project_path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "site".to_string());

    match init_project(&project_path, &project_name) {
        Ok(written) => {
            println!("Created webpipe project '{}' at {}", project_name, project_path.display());
            println!();
            for file in &written {
                println!("  {}", file.display());
            }
            println!();
            println!("Next steps:");
            println!("  cd {}", project_path.display());
            println!("  npm install");
            println!("  webpipe");
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(InitError::NotEmpty(dir)) => {
            eprintln!("Error: Directory '{}' already exists and is not empty", dir.display());
            eprintln!("Use an empty directory or specify a different path");
            ExitCode::from(EXIT_ERROR)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
