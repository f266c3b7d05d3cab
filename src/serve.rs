//! Local dev server and live-reload channel.
//!
//! Serves the destination root as a static site and pushes reload events to
//! connected browsers over a server-sent-events stream at `/__livereload`.
//! Served HTML gets a small injected listener script. Single local developer
//! use case: no authentication, no TLS.

use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tiny_http::{Header, Request, Response, Server};

/// Path of the server-sent-events reload endpoint
pub const RELOAD_ENDPOINT: &str = "/__livereload";

/// Keep-alive interval for idle reload streams
const KEEPALIVE: Duration = Duration::from_secs(15);

/// Listener script injected into served HTML pages.
const RELOAD_SCRIPT: &str = "<script>new EventSource('/__livereload')\
.addEventListener('message',function(){location.reload();});</script>";

/// Error from the dev server.
///
/// A bind failure is fatal to the server only; the watch loop and pipelines
/// keep working without live reload.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServeError {
    /// Could not bind the listen address
    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },
}

/// Broadcast channel pushing reload signals to connected browser sessions.
///
/// Cheap to clone; clones share the client list. Disconnected clients are
/// pruned on the next notify.
#[derive(Clone, Default)]
pub struct ReloadChannel {
    clients: Arc<Mutex<Vec<Sender<()>>>>,
}

impl ReloadChannel {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new client and return its signal receiver.
    pub fn subscribe(&self) -> Receiver<()> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut clients) = self.clients.lock() {
            clients.push(tx);
        }
        rx
    }

    /// Push one reload signal to every connected client, dropping clients
    /// that have gone away.
    pub fn notify(&self) {
        if let Ok(mut clients) = self.clients.lock() {
            clients.retain(|tx| tx.send(()).is_ok());
        }
    }

    /// Number of currently registered clients.
    pub fn client_count(&self) -> usize {
        self.clients.lock().map(|c| c.len()).unwrap_or(0)
    }
}

/// Dev server settings.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
    /// Directory served as the site root
    pub root: PathBuf,
}

/// Bind the listen address and serve in a background thread.
///
/// Binding happens before the thread starts so a port conflict surfaces to
/// the caller immediately.
pub fn spawn(options: ServeOptions, reload: ReloadChannel) -> Result<thread::JoinHandle<()>, ServeError> {
    let addr = format!("{}:{}", options.host, options.port);

    let server = Server::http(&addr).map_err(|e| ServeError::Bind {
        addr: addr.clone(),
        reason: e.to_string(),
    })?;

    println!("Serving {} at http://{}/", options.root.display(), addr);

    let handle = thread::spawn(move || {
        for request in server.incoming_requests() {
            let root = options.root.clone();
            let reload = reload.clone();
            // reload streams block for the life of the connection, so every
            // request gets its own thread
            thread::spawn(move || {
                if let Err(e) = handle_request(request, &root, &reload) {
                    eprintln!("Serve error: {}", e);
                }
            });
        }
    });

    Ok(handle)
}

fn handle_request(request: Request, root: &Path, reload: &ReloadChannel) -> std::io::Result<()> {
    let url = request.url().to_string();
    let path = url.split('?').next().unwrap_or("/");

    if path == RELOAD_ENDPOINT {
        return respond_event_stream(request, reload);
    }

    let Some(rel) = sanitize_path(path) else {
        return request.respond(Response::from_string("Forbidden").with_status_code(403));
    };

    let mut target = root.join(&rel);
    if target.is_dir() {
        let index = target.join("index.html");
        if index.is_file() {
            target = index;
        } else {
            let listing = directory_listing(&target, path);
            return request.respond(
                Response::from_string(listing)
                    .with_status_code(200)
                    .with_header(content_type_header("text/html; charset=utf-8")),
            );
        }
    }

    if !target.is_file() {
        return request.respond(Response::from_string("Not Found").with_status_code(404));
    }

    let bytes = std::fs::read(&target)?;
    let mime = content_type(&target);

    if mime == "text/html" {
        let html = String::from_utf8_lossy(&bytes).into_owned();
        let html = inject_reload_script(&html);
        return request.respond(
            Response::from_data(html.into_bytes())
                .with_header(content_type_header("text/html; charset=utf-8")),
        );
    }

    request.respond(Response::from_data(bytes).with_header(content_type_header(mime)))
}

/// Hold the connection open, forwarding reload signals as SSE messages.
fn respond_event_stream(request: Request, reload: &ReloadChannel) -> std::io::Result<()> {
    let stream = EventStream::new(reload.subscribe());
    let response = Response::new(
        tiny_http::StatusCode(200),
        vec![
            content_type_header("text/event-stream"),
            header("Cache-Control", "no-cache"),
        ],
        stream,
        None,
        None,
    );
    request.respond(response)
}

/// Blocking reader yielding SSE frames: one `data: reload` message per
/// signal, comment keep-alives while idle, EOF when the channel closes.
struct EventStream {
    rx: Receiver<()>,
    buf: Vec<u8>,
    pos: usize,
    opened: bool,
}

impl EventStream {
    fn new(rx: Receiver<()>) -> Self {
        Self { rx, buf: Vec::new(), pos: 0, opened: false }
    }
}

impl Read for EventStream {
    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        if self.pos >= self.buf.len() {
            if !self.opened {
                self.opened = true;
                self.buf = b"retry: 1000\n\n".to_vec();
            } else {
                match self.rx.recv_timeout(KEEPALIVE) {
                    Ok(()) => self.buf = b"data: reload\n\n".to_vec(),
                    Err(RecvTimeoutError::Timeout) => self.buf = b": keep-alive\n\n".to_vec(),
                    Err(RecvTimeoutError::Disconnected) => return Ok(0),
                }
            }
            self.pos = 0;
        }

        let n = (self.buf.len() - self.pos).min(out.len());
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// Normalize a request path to a safe, root-relative path.
///
/// Returns `None` for anything trying to escape the served root.
pub fn sanitize_path(url_path: &str) -> Option<PathBuf> {
    let trimmed = url_path.trim_start_matches('/');
    let mut clean = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(clean)
}

/// Content type by file extension.
pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("map") | Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

fn content_type_header(value: &str) -> Header {
    header("Content-Type", value)
}

fn header(name: &str, value: &str) -> Header {
    // names and values here are static and known-valid
    Header::from_bytes(name.as_bytes(), value.as_bytes()).expect("static header")
}

/// Insert the reload listener before `</body>`, or append when the page has
/// no closing body tag.
pub fn inject_reload_script(html: &str) -> String {
    match html.rfind("</body>") {
        Some(idx) => {
            let mut out = String::with_capacity(html.len() + RELOAD_SCRIPT.len());
            out.push_str(&html[..idx]);
            out.push_str(RELOAD_SCRIPT);
            out.push_str(&html[idx..]);
            out
        }
        None => {
            let mut out = html.to_string();
            out.push_str(RELOAD_SCRIPT);
            out
        }
    }
}

/// Minimal HTML listing of a directory's entries.
fn directory_listing(dir: &Path, url_path: &str) -> String {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| {
                    let mut name = e.file_name().to_string_lossy().into_owned();
                    if e.path().is_dir() {
                        name.push('/');
                    }
                    name
                })
                .collect()
        })
        .unwrap_or_default();
    names.sort();

    let base = if url_path.ends_with('/') {
        url_path.to_string()
    } else {
        format!("{}/", url_path)
    };

    let mut body = format!("<!doctype html><title>Index of {}</title><ul>", base);
    for name in names {
        body.push_str(&format!("<li><a href=\"{}{}\">{}</a></li>", base, name, name));
    }
    body.push_str("</ul>");
    body
}
