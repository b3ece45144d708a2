//! Dev command: build, serve and watch

use std::process::ExitCode;

use super::{GlobalArgs, EXIT_ERROR};
use crate::build::{run_failed, Executor};
use crate::config::CliOverrides;
use crate::serve::{DevServer, ReloadHub};
use crate::watch::{timestamp, watch, WatchDispatcher};

/// Run the dev command.
///
/// Build failures are reported but do not stop the server; only startup
/// problems (bad config, port in use, missing sources) exit.
pub fn run_dev(global: &GlobalArgs, port: Option<u16>, notify: bool, minify: bool) -> ExitCode {
    let overrides = CliOverrides { port, minify_scripts: minify.then_some(true), notify: notify.then_some(true) };
    let project = match global.load_project(&overrides) {
        Ok(project) => project,
        Err(code) => return code,
    };
    let context = &project.context;
    let reporter = global.reporter();

    let dispatcher = match WatchDispatcher::new(&project.graph, context, reporter.as_ref(), global.jobs()) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let executor = Executor::new(&project.graph, context, reporter.as_ref()).with_jobs(global.jobs());
    match executor.run("dev") {
        Ok(result) if run_failed(&result, context.is_strict()) => {
            eprintln!("[{}] Initial build had errors, serving anyway", timestamp());
        }
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    }

    let hub = ReloadHub::new();
    let server = match DevServer::start(context.project_root().to_path_buf(), &context.config().serve, hub.clone()) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    println!("[{}] Serving {} at {}", timestamp(), context.config().project.name, server.url());
    println!("Press Ctrl+C to stop");

    let outcome = watch(&dispatcher, &hub);
    drop(server);
    match outcome {
        Ok(()) => ExitCode::from(super::EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Watch error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
