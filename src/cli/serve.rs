//! Development server applying overrides to served HTML.
//!
//! Serves a static directory the way a production edge would: every
//! `text/html` response passes through the rewrite engine with the override
//! set for its page path, everything else is streamed through untouched.

use crate::config::EngineConfig;
use crate::engine::{Backend, RewriteEngine};
use crate::overrides::source::{CachedSource, FileSource, OverrideSource};
use crate::utils::mime;
use crate::{debug, log};
use anyhow::{Context, Result, bail};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

/// CLI overrides for the `[serve]` section.
#[derive(Debug, Default)]
pub struct ServeArgs {
    pub interface: Option<IpAddr>,
    pub port: Option<u16>,
    pub root: Option<PathBuf>,
    pub overrides: Option<PathBuf>,
    pub backend: Backend,
}

/// Start the server and block until Ctrl+C.
pub fn run_serve(config: &EngineConfig, args: ServeArgs) -> Result<()> {
    let interface = args.interface.unwrap_or(config.serve.interface);
    let port = args.port.unwrap_or(config.serve.port);
    let root = args.root.unwrap_or_else(|| config.serve.root.clone());
    let overrides = args
        .overrides
        .or_else(|| config.serve.overrides_file.clone());

    if !root.is_dir() {
        bail!("serve root `{}` is not a directory", root.display());
    }

    let addr = SocketAddr::new(interface, port);
    let server =
        Server::http(addr).map_err(|e| anyhow::anyhow!("Failed to bind {addr}: {e}"))?;
    let server = Arc::new(server);

    // Ctrl+C unblocks the accept loop for a clean shutdown.
    {
        let server = Arc::clone(&server);
        ctrlc::set_handler(move || server.unblock())
            .context("Failed to install Ctrl+C handler")?;
    }

    let source = overrides.map(|path| {
        debug!("serve"; "overrides from {}", path.display());
        CachedSource::new(
            FileSource::new(path),
            Duration::from_secs(config.platform.cache_ttl_seconds),
        )
    });
    if source.is_none() {
        log!("serve"; "no overrides file configured, serving files unmodified");
    }

    let engine = RewriteEngine::new(&config.rewrite.data_attribute);

    log!("serve"; "http://{addr}");

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, &root, &engine, source.as_ref(), args.backend) {
            log!("serve"; "request error: {e}");
        }
    }

    log!("serve"; "shutting down");
    Ok(())
}

/// Handle a single HTTP request.
fn handle_request(
    request: Request,
    root: &Path,
    engine: &RewriteEngine,
    source: Option<&CachedSource<FileSource>>,
    backend: Backend,
) -> Result<()> {
    let page = page_path(request.url());

    let Some(file) = resolve_path(request.url(), root) else {
        return respond_not_found(request, root);
    };

    let content_type = mime::from_path(&file);

    if request.method() == &Method::Head {
        let response =
            Response::empty(StatusCode(200)).with_header(make_header("Content-Type", content_type));
        return request.respond(response).map_err(Into::into);
    }

    // HTML goes through the engine; everything else is passed through.
    if content_type.contains("text/html")
        && let Some(source) = source
    {
        let html = fs::read_to_string(&file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let set = source.overrides_for(&page);
        let outcome = engine.process(content_type, &html, &set, backend);
        if outcome.rewritten {
            debug!("serve"; "{page}: {} override(s) applied", set.len());
        }
        return send_body(request, 200, content_type, outcome.body.into_bytes());
    }

    let body =
        fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    send_body(request, 200, content_type, body)
}

/// Respond with 404 page (custom or default).
fn respond_not_found(request: Request, root: &Path) -> Result<()> {
    use crate::utils::mime::types::{HTML, PLAIN};

    let custom_404 = root.join("404.html");
    if let Ok(body) = fs::read(&custom_404) {
        return send_body(request, 404, HTML, body);
    }
    send_body(request, 404, PLAIN, b"404 Not Found".to_vec())
}

fn send_body(
    request: Request,
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type));
    request.respond(response)?;
    Ok(())
}

fn make_header(field: &str, value: &str) -> Header {
    Header::from_bytes(field.as_bytes(), value.as_bytes()).expect("static header")
}

/// Page path as the override platform keys it: decoded, query stripped,
/// leading slash preserved.
fn page_path(url: &str) -> String {
    use percent_encoding::percent_decode_str;
    let path = url.split('?').next().unwrap_or(url);
    let decoded = percent_decode_str(path)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| path.to_string());
    if decoded.starts_with('/') {
        decoded
    } else {
        format!("/{decoded}")
    }
}

/// Resolve URL to filesystem path, handling index.html for directories
fn resolve_path(url: &str, serve_root: &Path) -> Option<PathBuf> {
    let clean = normalize_url(url);

    // Reject paths with suspicious patterns early
    if clean.contains("..") {
        return None;
    }

    let local = serve_root.join(&clean);

    // Canonicalize to resolve symlinks and verify path is under serve_root
    let canonical = local.canonicalize().ok()?;
    let root_canonical = serve_root.canonicalize().ok()?;

    if !canonical.starts_with(&root_canonical) {
        return None;
    }

    if canonical.is_file() {
        return Some(canonical);
    }

    if canonical.is_dir() {
        let index = canonical.join("index.html");
        if index.is_file() {
            return Some(index);
        }
    }

    None
}

/// Normalize URL: decode, strip query string, trim slashes
fn normalize_url(url: &str) -> String {
    use percent_encoding::percent_decode_str;
    let decoded = percent_decode_str(url)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default();

    let path = decoded.split('?').next().unwrap_or(&decoded);
    path.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_path_strips_query_and_decodes() {
        assert_eq!(page_path("/about?ref=nav"), "/about");
        assert_eq!(page_path("/pricing%20plans"), "/pricing plans");
        assert_eq!(page_path("/"), "/");
    }

    #[test]
    fn test_resolve_path_serves_index_html_for_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();

        let resolved = resolve_path("/", dir.path()).unwrap();
        assert!(resolved.ends_with("index.html"));
    }

    #[test]
    fn test_resolve_path_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_path("/../etc/passwd", dir.path()).is_none());
        assert!(resolve_path("/%2e%2e/etc/passwd", dir.path()).is_none());
    }

    #[test]
    fn test_resolve_path_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(resolve_path("/nothing.css", dir.path()).is_none());
    }
}
