//! Static file server with live reload.

use crate::config::ServeConfig;
use crate::serve::livereload::{client_script, inject_client, ReloadHub, EVENTS_PATH};
use crate::serve::ServeError;
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::convert::Infallible;
use std::future::IntoFuture;
use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::services::ServeDir;

#[derive(Clone)]
struct AppState {
    hub: ReloadHub,
    script: Arc<str>,
}

/// Build the router serving `root` with live reload.
pub fn router(root: PathBuf, hub: ReloadHub, notify: bool) -> Router {
    let state = AppState { hub, script: Arc::from(client_script(notify)) };
    Router::new()
        .route(EVENTS_PATH, get(events))
        .fallback_service(ServeDir::new(root))
        .layer(middleware::from_fn_with_state(state.clone(), inject_reload_client))
        .with_state(state)
}

async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.hub.subscribe())
        .filter_map(|message| message.ok())
        .map(|event| Ok(Event::default().event(event.name()).data(event.data())));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn inject_reload_client(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    let is_html = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/html"))
        .unwrap_or(false);
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => return (axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };
    let html = inject_client(&String::from_utf8_lossy(&bytes), &state.script);
    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(html))
}

/// A running dev server.
///
/// The server owns a tokio runtime on a background thread, so it can be
/// driven from synchronous code such as the watch loop.
pub struct DevServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<Result<(), ServeError>>>,
}

impl DevServer {
    /// Bind and start serving `root`.
    ///
    /// Binding happens before this returns, so a port conflict is reported
    /// here rather than on the server thread.
    pub fn start(root: PathBuf, config: &ServeConfig, hub: ReloadHub) -> Result<Self, ServeError> {
        let bind = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind).map_err(|source| ServeError::Bind { addr: bind.clone(), source })?;
        listener.set_nonblocking(true).map_err(ServeError::Runtime)?;
        let addr = listener.local_addr().map_err(ServeError::Runtime)?;

        let app = router(root, hub, config.notify);
        let (shutdown, signal) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("webpipe-serve".to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(2)
                    .enable_all()
                    .build()
                    .map_err(ServeError::Runtime)?;
                runtime.block_on(async move {
                    let listener = tokio::net::TcpListener::from_std(listener).map_err(ServeError::Runtime)?;
                    // open event streams never finish, so stop accepting instead of draining
                    tokio::select! {
                        result = axum::serve(listener, app).into_future() => result.map_err(ServeError::Runtime),
                        _ = signal => Ok(()),
                    }
                })
            })
            .map_err(ServeError::Runtime)?;

        Ok(Self { addr, shutdown: Some(shutdown), thread: Some(thread) })
    }

    /// Address the server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL for the console banner.
    pub fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Stop serving and wait for the server thread.
    pub fn shutdown(mut self) -> Result<(), ServeError> {
        self.stop()
    }

    fn stop(&mut self) -> Result<(), ServeError> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(ServeError::Panicked),
            None => Ok(()),
        }
    }
}

impl Drop for DevServer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serve::livereload::ReloadEvent;
    use std::fs;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpStream;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config() -> ServeConfig {
        ServeConfig { host: "127.0.0.1".to_string(), port: 0, notify: false }
    }

    fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        write!(stream, "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n", path).unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn test_serves_html_with_client() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.html"), "<html><body><h1>Hi</h1></body></html>").unwrap();
        fs::write(temp.path().join("style.css"), "body{margin:0}").unwrap();

        let server = DevServer::start(temp.path().to_path_buf(), &config(), ReloadHub::new()).unwrap();

        let page = get(server.addr(), "/");
        assert!(page.starts_with("HTTP/1.1 200"));
        assert!(page.contains("<h1>Hi</h1><script>"));
        assert!(page.contains(EVENTS_PATH));

        let css = get(server.addr(), "/style.css");
        assert!(css.ends_with("body{margin:0}"));
        assert!(!css.contains("<script>"));

        assert!(get(server.addr(), "/missing.html").starts_with("HTTP/1.1 404"));
        server.shutdown().unwrap();
    }

    #[test]
    fn test_pushes_events_to_browser() {
        let temp = TempDir::new().unwrap();
        let hub = ReloadHub::new();
        let server = DevServer::start(temp.path().to_path_buf(), &config(), hub.clone()).unwrap();

        let mut stream = TcpStream::connect(server.addr()).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        write!(stream, "GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", EVENTS_PATH).unwrap();

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        loop {
            line.clear();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" {
                break;
            }
        }

        hub.send(ReloadEvent::Inject(vec!["style.css".to_string()]));
        let mut received = String::new();
        while !received.contains("data: [\"style.css\"]") {
            line.clear();
            if reader.read_line(&mut line).unwrap() == 0 {
                break;
            }
            received.push_str(&line);
        }
        assert!(received.contains("event: inject"));
        server.shutdown().unwrap();
    }

    #[test]
    fn test_port_in_use() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = ServeConfig { port: taken.local_addr().unwrap().port(), ..config() };
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            DevServer::start(temp.path().to_path_buf(), &config, ReloadHub::new()),
            Err(ServeError::Bind { .. })
        ));
    }
}
