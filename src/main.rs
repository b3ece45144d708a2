//! webpipe - Command-line front-end asset pipeline

use std::process::ExitCode;

use webpipe::cli;

fn main() -> ExitCode {
    cli::run()
}
