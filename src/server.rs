//! Development server: static files from the build tree plus live reload.
//!
//! Live reload is an epoch counter bumped by the watcher after each
//! successful stage rerun. Browsers long-poll `/__livereload?since=N` and
//! reload when the epoch moves past N; the polling script is injected into
//! every served HTML document.

use crate::log::timestamp;
use crate::watch::ShutdownToken;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tiny_http::{Header, Request, Response, Server};

/// Dev server error
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen socket could not be bound
    #[error("Failed to bind dev server on port {port}: {message}")]
    Bind { port: u16, message: String },
}

/// Reload epoch shared between the watcher and long-polling clients.
#[derive(Debug, Default)]
pub struct LiveReload {
    epoch: Mutex<u64>,
    changed: Condvar,
}

impl LiveReload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the epoch and wake all waiting clients.
    pub fn bump(&self) {
        let mut epoch = self.epoch.lock().unwrap_or_else(|e| e.into_inner());
        *epoch += 1;
        self.changed.notify_all();
    }

    pub fn current(&self) -> u64 {
        *self.epoch.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until the epoch exceeds `since` or the timeout passes; returns
    /// the epoch at wake-up.
    pub fn wait_beyond(&self, since: u64, timeout: Duration) -> u64 {
        let mut epoch = self.epoch.lock().unwrap_or_else(|e| e.into_inner());
        let deadline = std::time::Instant::now() + timeout;
        while *epoch <= since {
            let remaining = match deadline.checked_duration_since(std::time::Instant::now()) {
                Some(r) if !r.is_zero() => r,
                _ => break,
            };
            let (guard, _) = self
                .changed
                .wait_timeout(epoch, remaining)
                .unwrap_or_else(|e| e.into_inner());
            epoch = guard;
        }
        *epoch
    }
}

const RELOAD_SCRIPT: &str = "<script>\
(function poll(since){\
fetch('/__livereload?since='+since).then(function(r){return r.json();})\
.then(function(d){if(d.epoch>since){location.reload();}else{poll(d.epoch);}})\
.catch(function(){setTimeout(function(){poll(since);},1000);});\
})(0);\
</script>";

pub struct DevServer {
    /// Absolute path of the directory being served (the build root)
    root: PathBuf,
    port: u16,
    reload: Arc<LiveReload>,
}

impl DevServer {
    pub fn new(root: impl Into<PathBuf>, port: u16, reload: Arc<LiveReload>) -> Self {
        Self { root: root.into(), port, reload }
    }

    /// Serve until the token triggers. Each request is handled on its own
    /// thread since live-reload clients hold their connection open.
    pub fn run(&self, token: &ShutdownToken) -> Result<(), ServerError> {
        let server = Server::http(("0.0.0.0", self.port)).map_err(|e| ServerError::Bind {
            port: self.port,
            message: e.to_string(),
        })?;
        println!(
            "[{}] Serving {} at http://localhost:{}",
            timestamp(),
            self.root.display(),
            self.port
        );

        loop {
            if token.is_triggered() {
                return Ok(());
            }
            let request = match server.recv_timeout(Duration::from_millis(200)) {
                Ok(Some(r)) => r,
                Ok(None) => continue,
                Err(_) => continue,
            };
            let root = self.root.clone();
            let reload = Arc::clone(&self.reload);
            thread::spawn(move || handle_request(request, &root, &reload));
        }
    }
}

fn handle_request(request: Request, root: &Path, reload: &LiveReload) {
    let url = request.url().to_string();
    let (path, query) = match url.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (url.as_str(), None),
    };

    let response_result = if path == "/__livereload" {
        let since = query
            .and_then(|q| q.split('&').find_map(|kv| kv.strip_prefix("since=")))
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let epoch = reload.wait_beyond(since, Duration::from_secs(25));
        let body = format!("{{\"epoch\":{}}}", epoch);
        request.respond(with_content_type(Response::from_data(body.into_bytes()), "application/json"))
    } else {
        match serve_file(root, path) {
            Some((bytes, mime)) => {
                request.respond(with_content_type(Response::from_data(bytes), mime))
            }
            None => request.respond(Response::from_string("Not Found").with_status_code(404)),
        }
    };
    // Client hangups mid-response are routine
    let _ = response_result;
}

fn with_content_type(
    response: Response<std::io::Cursor<Vec<u8>>>,
    mime: &str,
) -> Response<std::io::Cursor<Vec<u8>>> {
    match Header::from_bytes(&b"Content-Type"[..], mime.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(_) => response,
    }
}

/// Resolve a URL path to file content, injecting the reload script into
/// HTML. Returns None for missing files and traversal attempts.
fn serve_file(root: &Path, url_path: &str) -> Option<(Vec<u8>, &'static str)> {
    let rel = sanitize(url_path)?;
    let mut path = root.join(&rel);
    if path.is_dir() {
        path = path.join("index.html");
    }
    let bytes = std::fs::read(&path).ok()?;
    let mime = content_type(&path);
    if mime == "text/html" {
        return Some((inject_reload(bytes), mime));
    }
    Some((bytes, mime))
}

/// Strip the leading slash and reject any path escaping the served root.
fn sanitize(url_path: &str) -> Option<PathBuf> {
    let trimmed = url_path.trim_start_matches('/');
    let path = Path::new(trimmed);
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    Some(path.to_path_buf())
}

fn inject_reload(bytes: Vec<u8>) -> Vec<u8> {
    let html = String::from_utf8_lossy(&bytes);
    let injected = match html.rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], RELOAD_SCRIPT, &html[pos..]),
        None => format!("{}{}", html, RELOAD_SCRIPT),
    };
    injected.into_bytes()
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "html" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_live_reload_bump_and_current() {
        let reload = LiveReload::new();
        assert_eq!(reload.current(), 0);
        reload.bump();
        reload.bump();
        assert_eq!(reload.current(), 2);
    }

    #[test]
    fn test_wait_beyond_returns_immediately_when_past() {
        let reload = LiveReload::new();
        reload.bump();
        let epoch = reload.wait_beyond(0, Duration::from_secs(5));
        assert_eq!(epoch, 1);
    }

    #[test]
    fn test_wait_beyond_times_out() {
        let reload = LiveReload::new();
        let start = std::time::Instant::now();
        let epoch = reload.wait_beyond(0, Duration::from_millis(50));
        assert_eq!(epoch, 0);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_wait_beyond_wakes_on_bump() {
        let reload = Arc::new(LiveReload::new());
        let waiter = Arc::clone(&reload);
        let handle = thread::spawn(move || waiter.wait_beyond(0, Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));
        reload.bump();
        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn test_sanitize_rejects_traversal() {
        assert!(sanitize("/../etc/passwd").is_none());
        assert!(sanitize("/css/../../secret").is_none());
        assert_eq!(sanitize("/css/style.css"), Some(PathBuf::from("css/style.css")));
        assert_eq!(sanitize("/"), Some(PathBuf::new()));
    }

    #[test]
    fn test_serve_html_injects_script() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.html"), "<html><body>hi</body></html>").unwrap();

        let (bytes, mime) = serve_file(temp.path(), "/").unwrap();
        assert_eq!(mime, "text/html");
        let html = String::from_utf8(bytes).unwrap();
        assert!(html.contains("__livereload"));
        assert!(html.ends_with("</body></html>"), "script goes before </body>: {}", html);
    }

    #[test]
    fn test_serve_non_html_untouched() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("css")).unwrap();
        fs::write(temp.path().join("css/style.css"), "body{margin:0}").unwrap();

        let (bytes, mime) = serve_file(temp.path(), "/css/style.css").unwrap();
        assert_eq!(mime, "text/css");
        assert_eq!(bytes, b"body{margin:0}");
    }

    #[test]
    fn test_serve_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(serve_file(temp.path(), "/missing.html").is_none());
    }
}
