//! Development server.
//!
//! Serves the project root over HTTP, injects a live-reload client into HTML
//! pages and pushes [`ReloadEvent`]s to connected browsers.

pub mod livereload;
pub mod server;

pub use livereload::{client_script, inject_client, ReloadEvent, ReloadHub, EVENTS_PATH};
pub use server::{router, DevServer};

use thiserror::Error;

/// Error starting or running the dev server.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The listen address could not be bound
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        /// Requested address
        addr: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// Runtime or socket failure
    #[error("server error: {0}")]
    Runtime(#[source] std::io::Error),
    /// The server thread panicked
    #[error("server thread panicked")]
    Panicked,
}
